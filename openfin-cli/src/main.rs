use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use openfin_core::Institution;
use openfin_finance::{profiles, CsvSink, StatementNormalizer, TransactionSink};
use openfin_ingest::{read_merged, reconstruct_tables, render_tables, AnalyzeResponse};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod analyzer;
mod config;
mod pdf;
mod pipeline;
mod staging;
mod state;

use analyzer::HttpAnalyzer;
use config::{Config, StagingKind};
use pdf::QpdfTool;
use pipeline::{ParseRequest, PipelineContext, PipelineSettings};
use staging::{HttpStagingStore, LocalStagingStore, StagingStore};

const PASSWORD_ENV: &str = "OPENFIN_PDF_PASSWORD";
const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("OPENFIN_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(
    name = "openfin",
    version,
    long_version = LONG_VERSION,
    about = "Turn bank statement PDFs into normalized transactions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decrypt, chunk, extract, assemble, normalize and write one statement
    Parse {
        /// Statement PDF
        #[arg(long)]
        input: PathBuf,

        /// nubank | itau | davivienda
        #[arg(long)]
        institution: Institution,

        /// PDF password (falls back to $OPENFIN_PDF_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Directory for the transactions CSV (default: [pipeline].output_dir or .)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the table CSV of a saved service response
    Reconstruct {
        /// JSON response with a top-level "Blocks" array
        #[arg(long)]
        blocks: PathBuf,
    },

    /// Normalize an already merged table CSV
    Normalize {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        institution: Institution,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List built-in institution profiles
    Profiles,

    /// Manage ~/.openfin/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("openfin=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Parse {
            input,
            institution,
            password,
            out,
            json,
        } => {
            let cfg = config::load_config()?;
            let ctx = build_context(&cfg, out)?;
            let request = ParseRequest {
                input,
                institution,
                password: password.or_else(|| std::env::var(PASSWORD_ENV).ok()),
            };

            let report = pipeline::run(&ctx, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
        }

        Command::Reconstruct { blocks } => {
            let text = std::fs::read_to_string(&blocks).with_context(|| format!("read {}", blocks.display()))?;
            let response: AnalyzeResponse =
                serde_json::from_str(&text).with_context(|| format!("parse {}", blocks.display()))?;
            let tables = reconstruct_tables(&response.blocks);
            if tables.is_empty() {
                eprintln!("no table found in {}", blocks.display());
                return Ok(());
            }
            print!("{}", render_tables(&tables)?);
        }

        Command::Normalize { csv, institution, out } => {
            if !csv.exists() {
                bail!("CSV not found: {} (pass --csv <path>)", csv.display());
            }
            let cfg = config::load_config()?;
            let merged = read_merged(&csv)?;
            let statement = StatementNormalizer::for_institution(institution)?.normalize(&merged);

            let document = csv
                .file_name()
                .and_then(|n| n.to_str())
                .context("CSV path has no file name")?;
            let sink = CsvSink::new(output_dir(&cfg, out));
            let location = sink.write(institution, document, &statement.transactions)?;

            let report = &statement.report;
            println!(
                "Normalized {} of {} rows ({} skipped, {} rejected, {} unresolved fields)",
                report.rows_out,
                report.rows_in,
                report.skipped_rows,
                report.rejected.len(),
                report.unresolved_fields
            );
            for rejected in &report.rejected {
                println!("- row {}: {}", rejected.row, rejected.reason);
            }
            println!("Wrote {location}");
        }

        Command::Profiles => {
            for p in profiles() {
                println!(
                    "{} | currency={} | decimal='{}' thousands='{}' | date={}",
                    p.institution, p.currency, p.number.decimal, p.number.thousands, p.date_format
                );
                for rule in p.columns {
                    println!("    {:<24} -> {} ({:?})", rule.source, rule.target, rule.kind);
                }
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

fn output_dir(cfg: &Config, out: Option<PathBuf>) -> PathBuf {
    out.or_else(|| cfg.pipeline.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Wire the configured collaborators for one run.
fn build_context(cfg: &Config, out: Option<PathBuf>) -> Result<PipelineContext> {
    let timeout = Duration::from_secs(cfg.analyzer.timeout_secs);

    let staging: Arc<dyn StagingStore> = match cfg.staging.kind {
        StagingKind::Local => {
            let root = match &cfg.staging.root {
                Some(root) => root.clone(),
                None => state::default_staging_root()?,
            };
            Arc::new(LocalStagingStore::new(root, cfg.staging.bucket.clone()))
        }
        StagingKind::Http => {
            let endpoint = cfg
                .staging
                .endpoint
                .as_deref()
                .context("staging.endpoint is required when staging.kind = \"http\"")?;
            Arc::new(HttpStagingStore::new(endpoint, cfg.staging.bucket.clone(), timeout)?)
        }
    };

    let work_dir = match &cfg.pipeline.work_dir {
        Some(dir) => dir.clone(),
        None => state::default_work_dir()?,
    };

    Ok(PipelineContext {
        analyzer: Arc::new(HttpAnalyzer::from_config(&cfg.analyzer)?),
        staging,
        pdf: Arc::new(QpdfTool::locate(&cfg.pdf.qpdf_command)?),
        sink: Arc::new(CsvSink::new(output_dir(cfg, out))),
        settings: PipelineSettings::from_section(&cfg.pipeline, work_dir),
    })
}
