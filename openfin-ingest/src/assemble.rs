//! Merge per-unit tables into one table for the whole document.
//!
//! Every table's header row (its first row) is its schema. The schema seen
//! most often wins; ties go to the one that appears first in document order.
//! Tables with any other schema are dropped. Short cover or summary tables at
//! document boundaries fall out without hard-coding which pages to skip.

use openfin_core::{ChunkResult, MergedTable};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub units: usize,
    pub units_without_table: usize,
    pub units_failed: usize,
    pub tables_seen: usize,
    pub tables_kept: usize,
    pub tables_dropped: usize,
}

struct Candidate<'a> {
    ordinal: u32,
    header: Vec<String>,
    body: Vec<Vec<String>>,
    unit_id: &'a str,
}

/// Majority header among `headers`, first-seen on ties.
fn majority_schema<'a>(headers: impl Iterator<Item = &'a Vec<String>>) -> Option<Vec<String>> {
    let mut counts: Vec<(&Vec<String>, usize)> = Vec::new();
    for header in headers {
        match counts.iter_mut().find(|(h, _)| *h == header) {
            Some((_, n)) => *n += 1,
            None => counts.push((header, 1)),
        }
    }

    let mut best: Option<(&Vec<String>, usize)> = None;
    for (header, n) in counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((header, n));
        }
    }
    best.map(|(h, _)| h.clone())
}

/// Assemble one document's chunk results.
///
/// Input order does not matter: results are put in ordinal order first.
/// With no table anywhere the result is an empty table, not an error.
pub fn assemble(chunks: &[ChunkResult]) -> (MergedTable, AssemblyReport) {
    let mut ordered: Vec<&ChunkResult> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.ordinal);

    let mut report = AssemblyReport {
        units: ordered.len(),
        ..AssemblyReport::default()
    };

    let mut candidates = Vec::new();
    for chunk in &ordered {
        if chunk.is_failed() {
            report.units_failed += 1;
        }
        if !chunk.has_table() {
            report.units_without_table += 1;
            continue;
        }
        for table in chunk.tables() {
            let mut grid = table.to_grid().into_iter();
            let Some(header) = grid.next() else { continue };
            candidates.push(Candidate {
                ordinal: chunk.ordinal,
                header,
                body: grid.collect(),
                unit_id: &chunk.unit_id,
            });
        }
    }
    report.tables_seen = candidates.len();

    let Some(schema) = majority_schema(candidates.iter().map(|c| &c.header)) else {
        debug!("no tables in document; assembled table is empty");
        return (MergedTable::default(), report);
    };

    let mut merged = MergedTable::new(schema);
    for candidate in candidates {
        if candidate.header != merged.columns {
            warn!(
                unit = candidate.unit_id,
                ordinal = candidate.ordinal,
                columns = ?candidate.header,
                "dropping table with minority schema"
            );
            report.tables_dropped += 1;
            continue;
        }
        report.tables_kept += 1;
        for row in candidate.body {
            if row.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            merged.push_row(row);
        }
    }

    (merged, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openfin_core::{ExtractedTable, UnitOutcome};
    use pretty_assertions::assert_eq;

    fn chunk(ordinal: u32, rows: &[Vec<&str>]) -> ChunkResult {
        ChunkResult::new(
            ordinal,
            format!("doc_chunk_{ordinal}.pdf"),
            UnitOutcome::Tables(vec![ExtractedTable::from_rows(rows)]),
        )
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_majority_schema_wins_and_order_is_kept() {
        let chunks = vec![
            chunk(1, &[vec!["A", "B"], vec!["1", "2"]]),
            chunk(2, &[vec!["A", "B"], vec!["3", "4"], vec!["5", "6"]]),
            chunk(3, &[vec!["C"], vec!["x"]]),
        ];

        let (merged, report) = assemble(&chunks);
        assert_eq!(merged.columns, strings(&["A", "B"]));
        assert_eq!(
            merged.rows,
            vec![strings(&["1", "2"]), strings(&["3", "4"]), strings(&["5", "6"])]
        );
        assert_eq!(report.tables_kept, 2);
        assert_eq!(report.tables_dropped, 1);
    }

    #[test]
    fn test_completion_order_does_not_matter() {
        let chunks = vec![
            chunk(3, &[vec!["A"], vec!["third"]]),
            chunk(1, &[vec!["A"], vec!["first"]]),
            chunk(2, &[vec!["A"], vec!["second"]]),
        ];
        let (merged, _) = assemble(&chunks);
        assert_eq!(merged.rows, vec![strings(&["first"]), strings(&["second"]), strings(&["third"])]);
    }

    #[test]
    fn test_tie_goes_to_first_seen_schema() {
        let chunks = vec![
            chunk(2, &[vec!["Y"], vec!["y"]]),
            chunk(1, &[vec!["X"], vec!["x"]]),
        ];
        let (merged, _) = assemble(&chunks);
        assert_eq!(merged.columns, strings(&["X"]));
    }

    #[test]
    fn test_no_tables_gives_empty_table() {
        let chunks = vec![
            ChunkResult::new(1, "a_chunk_1.pdf", UnitOutcome::NoTable),
            ChunkResult::new(2, "a_chunk_2.pdf", UnitOutcome::Failed { reason: "timeout".into(), attempts: 3 }),
        ];
        let (merged, report) = assemble(&chunks);
        assert!(merged.is_empty());
        assert!(merged.columns.is_empty());
        assert_eq!(report.units_without_table, 2);
        assert_eq!(report.units_failed, 1);
    }

    #[test]
    fn test_no_table_unit_does_not_block_the_rest() {
        let chunks = vec![
            ChunkResult::new(1, "a_chunk_1.pdf", UnitOutcome::NoTable),
            chunk(2, &[vec!["A", "B"], vec!["1", "2"]]),
        ];
        let (merged, report) = assemble(&chunks);
        assert_eq!(merged.len(), 1);
        assert_eq!(report.units_without_table, 1);
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let chunks = vec![chunk(1, &[vec!["A", "B"], vec!["", ""], vec!["1", ""]])];
        let (merged, _) = assemble(&chunks);
        assert_eq!(merged.rows, vec![strings(&["1", ""])]);
    }
}
