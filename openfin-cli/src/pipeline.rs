//! Document pipeline: decrypt, chunk, extract, assemble, normalize, sink.
//!
//! Every stage either advances the document or fails it with the stage it
//! could not reach. Unit-level trouble (a unit with no table, a unit whose
//! service call kept failing) is counted in the report instead.

use anyhow::{bail, Context, Result};
use futures_util::stream::{self, StreamExt};
use openfin_core::{ChunkResult, Institution, UnitOutcome};
use openfin_finance::{StatementNormalizer, TransactionSink};
use openfin_ingest::{assemble, order_units, reconstruct_unit, render_tables, write_merged, AnalyzeResponse, DocumentUnit};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyzer::DocumentAnalyzer;
use crate::config::{PipelineSection, UnitFailurePolicy};
use crate::pdf::PdfTool;
use crate::staging::StagingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Created,
    Decrypted,
    Chunked,
    Extracted,
    Assembled,
    Normalized,
    Sunk,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Fatal document failure. `stage` is the stage that could not be reached.
#[derive(Debug, thiserror::Error)]
#[error("document failed at stage {stage}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

fn at(stage: Stage) -> impl FnOnce(anyhow::Error) -> PipelineError {
    move |source| PipelineError { stage, source }
}

/// Bounded exponential backoff for one unit's service call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub unit_size: u32,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub on_unit_failure: UnitFailurePolicy,
    pub work_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_section(section: &PipelineSection, work_dir: PathBuf) -> Self {
        Self {
            unit_size: section.unit_size.max(1),
            concurrency: section.concurrency.max(1),
            retry: RetryPolicy {
                max_attempts: section.max_attempts.max(1),
                base: Duration::from_millis(section.backoff_base_ms),
                max: Duration::from_millis(section.backoff_max_ms),
            },
            on_unit_failure: section.on_unit_failure,
            work_dir,
        }
    }
}

/// Everything one run needs, passed explicitly.
#[derive(Clone)]
pub struct PipelineContext {
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub staging: Arc<dyn StagingStore>,
    pub pdf: Arc<dyn PdfTool>,
    pub sink: Arc<dyn TransactionSink>,
    pub settings: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub input: PathBuf,
    pub institution: Institution,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub document: String,
    pub institution: Institution,
    pub stage: Stage,
    pub units: usize,
    pub units_without_table: usize,
    pub units_failed: usize,
    pub tables_dropped: usize,
    pub rows: usize,
    pub transactions: usize,
    pub skipped_rows: usize,
    pub unresolved_fields: usize,
    pub rejected_rows: usize,
    pub merged_csv: PathBuf,
    pub output: String,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "document succeeded with {} unresolved fields: {} ({})",
            self.unresolved_fields, self.document, self.institution
        )?;
        writeln!(
            f,
            "units: {} (without table: {}, failed: {}), tables dropped: {}",
            self.units, self.units_without_table, self.units_failed, self.tables_dropped
        )?;
        writeln!(
            f,
            "rows: {} -> transactions: {} (skipped: {}, rejected: {})",
            self.rows, self.transactions, self.skipped_rows, self.rejected_rows
        )?;
        writeln!(f, "merged table: {}", self.merged_csv.display())?;
        write!(f, "transactions: {}", self.output)
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("blocking task panicked")?
}

fn document_names(input: &Path) -> Result<(String, String)> {
    let document = input
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no usable file name in {}", input.display()))?
        .to_string();
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&document)
        .to_string();
    Ok((document, stem))
}

/// Run one document through every stage.
pub async fn run(ctx: &PipelineContext, request: &ParseRequest) -> Result<RunReport, PipelineError> {
    let settings = &ctx.settings;
    let (document, stem) = document_names(&request.input).map_err(at(Stage::Decrypted))?;
    let doc_dir = settings.work_dir.join(&stem);
    info!(document = %document, institution = %request.institution, stage = %Stage::Created, "parsing statement");

    if !request.input.is_file() {
        return Err(at(Stage::Decrypted)(anyhow::anyhow!(
            "input not found: {}",
            request.input.display()
        )));
    }
    std::fs::create_dir_all(&doc_dir)
        .with_context(|| format!("create {}", doc_dir.display()))
        .map_err(at(Stage::Decrypted))?;

    let decrypted = {
        let pdf = Arc::clone(&ctx.pdf);
        let input = request.input.clone();
        let password = request.password.clone();
        let out_dir = doc_dir.clone();
        blocking(move || pdf.decrypt(&input, password.as_deref(), &out_dir))
            .await
            .map_err(at(Stage::Decrypted))?
    };
    info!(stage = %Stage::Decrypted, path = %decrypted.display(), "decrypted");

    let units = {
        let pdf = Arc::clone(&ctx.pdf);
        let unit_size = settings.unit_size;
        let units_dir = doc_dir.join("units");
        blocking(move || pdf.paginate(&decrypted, unit_size, &units_dir))
            .await
            .and_then(order_units)
            .and_then(|units| {
                if units.is_empty() {
                    bail!("document has no pages");
                }
                Ok(units)
            })
            .map_err(at(Stage::Chunked))?
    };
    info!(stage = %Stage::Chunked, units = units.len(), "chunked");

    let chunks = extract_units(ctx, units, &doc_dir)
        .await
        .map_err(at(Stage::Extracted))?;
    info!(stage = %Stage::Extracted, "extracted");

    let (merged, assembly) = assemble(&chunks);
    let merged_csv = settings.work_dir.join(format!("{stem}_merged.csv"));
    write_merged(&merged, &merged_csv).map_err(at(Stage::Assembled))?;
    info!(stage = %Stage::Assembled, rows = merged.len(), columns = merged.columns.len(), "assembled");

    let normalizer = StatementNormalizer::for_institution(request.institution).map_err(at(Stage::Normalized))?;
    let statement = normalizer.normalize(&merged);
    info!(
        stage = %Stage::Normalized,
        transactions = statement.transactions.len(),
        unresolved = statement.report.unresolved_fields,
        "normalized"
    );

    let output = {
        let sink = Arc::clone(&ctx.sink);
        let institution = request.institution;
        let document = document.clone();
        let txns = statement.transactions.clone();
        blocking(move || sink.write(institution, &document, &txns))
            .await
            .map_err(at(Stage::Sunk))?
    };
    info!(stage = %Stage::Sunk, output = %output, "done");

    Ok(RunReport {
        document,
        institution: request.institution,
        stage: Stage::Sunk,
        units: assembly.units,
        units_without_table: assembly.units_without_table,
        units_failed: assembly.units_failed,
        tables_dropped: assembly.tables_dropped,
        rows: statement.report.rows_in,
        transactions: statement.report.rows_out,
        skipped_rows: statement.report.skipped_rows,
        unresolved_fields: statement.report.unresolved_fields,
        rejected_rows: statement.report.rejected.len(),
        merged_csv,
        output,
    })
}

/// Analyze every unit with bounded concurrency and return the results in
/// ordinal order.
async fn extract_units(ctx: &PipelineContext, units: Vec<DocumentUnit>, csv_dir: &Path) -> Result<Vec<ChunkResult>> {
    let settings = &ctx.settings;
    let mut pending = stream::iter(units)
        .map(|unit| process_unit(ctx, unit, csv_dir))
        .buffer_unordered(settings.concurrency);

    let mut chunks = Vec::new();
    while let Some(chunk) = pending.next().await {
        if let UnitOutcome::Failed { reason, attempts } = &chunk.outcome {
            if settings.on_unit_failure == UnitFailurePolicy::Fail {
                bail!("unit {} failed after {attempts} attempts: {reason}", chunk.unit_id);
            }
        }
        chunks.push(chunk);
    }

    chunks.sort_by_key(|c| c.ordinal);
    Ok(chunks)
}

async fn analyze_once(ctx: &PipelineContext, unit: &DocumentUnit) -> Result<AnalyzeResponse> {
    let object = ctx.staging.upload(&unit.path).await.context("staging unit")?;
    ctx.analyzer.analyze(&object).await
}

async fn process_unit(ctx: &PipelineContext, unit: DocumentUnit, csv_dir: &Path) -> ChunkResult {
    let retry = ctx.settings.retry;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match analyze_once(ctx, &unit).await {
            Ok(response) => {
                let chunk = reconstruct_unit(unit.ordinal, &unit.id, &response.blocks);
                if chunk.has_table() {
                    if let Err(e) = write_unit_csv(&chunk, csv_dir).await {
                        warn!(unit = %unit.id, error = %format!("{e:#}"), "could not keep unit csv");
                    }
                }
                debug!(unit = %unit.id, ordinal = unit.ordinal, attempt, tables = chunk.tables().len(), "unit extracted");
                return chunk;
            }
            Err(e) if attempt < retry.max_attempts => {
                let delay = retry.delay(attempt);
                warn!(
                    unit = %unit.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %format!("{e:#}"),
                    "unit analysis failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(unit = %unit.id, attempts = attempt, error = %format!("{e:#}"), "unit analysis gave up");
                return ChunkResult::new(
                    unit.ordinal,
                    unit.id,
                    UnitOutcome::Failed {
                        reason: format!("{e:#}"),
                        attempts: attempt,
                    },
                );
            }
        }
    }
}

async fn write_unit_csv(chunk: &ChunkResult, dir: &Path) -> Result<()> {
    let text = render_tables(chunk.tables())?;
    let path = dir.join(Path::new(&chunk.unit_id).with_extension("csv"));
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("write {}", path.display()))
}
