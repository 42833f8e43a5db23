//! Comma-separated rendering of reconstructed and merged tables.
//!
//! Fields containing the separator, quotes or line breaks are quoted; plain
//! fields are written bare. Everything rendered here parses back with
//! [`parse_csv`] to the same cell values.

use anyhow::{Context, Result};
use openfin_core::{ExtractedTable, MergedTable};
use std::path::Path;

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new())
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("flushing csv buffer")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

/// Render every table of one unit, one after another, as a single CSV text.
pub fn render_tables(tables: &[ExtractedTable]) -> Result<String> {
    let mut wtr = writer();
    for table in tables {
        for row in table.to_grid() {
            wtr.write_record(&row)?;
        }
    }
    finish(wtr)
}

/// Header line followed by every merged row.
pub fn render_merged(table: &MergedTable) -> Result<String> {
    let mut wtr = writer();
    if !table.columns.is_empty() {
        wtr.write_record(&table.columns)?;
    }
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    finish(wtr)
}

/// Parse CSV text into raw rows (no header handling, rows may differ in width).
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.context("reading csv record")?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Read a merged table previously written with [`render_merged`].
pub fn read_merged(path: impl AsRef<Path>) -> Result<MergedTable> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut rows = parse_csv(&text)?.into_iter();
    let Some(columns) = rows.next() else {
        return Ok(MergedTable::default());
    };
    let mut table = MergedTable::new(columns);
    for row in rows {
        table.push_row(row);
    }
    Ok(table)
}

pub fn write_merged(table: &MergedTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, render_merged(table)?).with_context(|| format!("writing {}", path.display()))
}
