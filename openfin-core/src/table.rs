//! Tabular shapes that flow from OCR reconstruction through chunk assembly
//! into the normalizer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text of one reconstructed cell plus the service's confidence for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    /// 0-100 as reported by the OCR service
    pub confidence: Option<f32>,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// One row of an extracted table, keyed by the service's 1-based column index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// 1-based row index as reported by the service
    pub index: u32,
    pub cells: BTreeMap<u32, Cell>,
}

/// A table recovered from one OCR call.
///
/// Row and column indices are kept as reported; missing indices are holes and
/// render as empty cells rather than shifting later columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub rows: Vec<TableRow>,
}

impl ExtractedTable {
    /// Build a dense table from plain rows (row/column indices start at 1).
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(r, cols)| TableRow {
                index: r as u32 + 1,
                cells: cols
                    .iter()
                    .enumerate()
                    .map(|(c, text)| (c as u32 + 1, Cell::new(text.as_ref())))
                    .collect(),
            })
            .collect();
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest column index seen in any row.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.cells.keys().next_back())
            .copied()
            .max()
            .unwrap_or(0) as usize
    }

    /// Dense rendering: every row has `width()` entries, holes are "".
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        let width = self.width();
        self.rows
            .iter()
            .map(|row| {
                (1..=width as u32)
                    .map(|c| row.cells.get(&c).map(|cell| cell.text.clone()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// First row of the grid, used as the column names of the table.
    pub fn header(&self) -> Vec<String> {
        self.to_grid().into_iter().next().unwrap_or_default()
    }

    pub fn mean_confidence(&self) -> Option<f32> {
        let scores: Vec<f32> = self
            .rows
            .iter()
            .flat_map(|r| r.cells.values())
            .filter_map(|c| c.confidence)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f32>() / scores.len() as f32)
    }

    /// (row, column, confidence) of every cell scored below `threshold`.
    pub fn low_confidence_cells(&self, threshold: f32) -> Vec<(u32, u32, f32)> {
        let mut out = Vec::new();
        for row in &self.rows {
            for (col, cell) in &row.cells {
                if let Some(score) = cell.confidence {
                    if score < threshold {
                        out.push((row.index, *col, score));
                    }
                }
            }
        }
        out
    }
}

/// What one document unit produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnitOutcome {
    /// One or more tables, in encounter order
    Tables(Vec<ExtractedTable>),
    /// The call succeeded but the unit has no table (cover pages etc.)
    NoTable,
    /// The call kept failing after retries
    Failed { reason: String, attempts: u32 },
}

/// Extraction result of one document unit, tagged with the unit's ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Position of the unit in the document, derived from its identifier
    pub ordinal: u32,
    pub unit_id: String,
    pub outcome: UnitOutcome,
}

impl ChunkResult {
    pub fn new(ordinal: u32, unit_id: impl Into<String>, outcome: UnitOutcome) -> Self {
        Self {
            ordinal,
            unit_id: unit_id.into(),
            outcome,
        }
    }

    /// Tables of this unit; empty for `NoTable` and `Failed`.
    pub fn tables(&self) -> &[ExtractedTable] {
        match &self.outcome {
            UnitOutcome::Tables(tables) => tables,
            _ => &[],
        }
    }

    pub fn has_table(&self) -> bool {
        !self.tables().is_empty()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Failed { .. })
    }
}

/// A single logical table assembled from every chunk of a document.
///
/// All rows share `columns`; each row has exactly `columns.len()` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` under column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sparse_row_renders_holes() {
        let mut cells = BTreeMap::new();
        cells.insert(1, Cell::new("a"));
        cells.insert(3, Cell::new("c"));
        let table = ExtractedTable {
            rows: vec![TableRow { index: 1, cells }],
        };

        assert_eq!(table.width(), 3);
        assert_eq!(table.to_grid(), vec![vec!["a".to_string(), String::new(), "c".to_string()]]);
    }

    #[test]
    fn test_confidence_diagnostics() {
        let mut table = ExtractedTable::from_rows(&[vec!["x", "y"]]);
        table.rows[0].cells.get_mut(&1).unwrap().confidence = Some(90.0);
        table.rows[0].cells.get_mut(&2).unwrap().confidence = Some(40.0);

        assert_eq!(table.mean_confidence(), Some(65.0));
        assert_eq!(table.low_confidence_cells(50.0), vec![(1, 2, 40.0)]);
    }

    #[test]
    fn test_merged_push_row_pads_and_truncates() {
        let mut merged = MergedTable::new(vec!["A".into(), "B".into()]);
        merged.push_row(vec!["1".into()]);
        merged.push_row(vec!["1".into(), "2".into(), "3".into()]);

        assert_eq!(merged.rows[0], vec!["1".to_string(), String::new()]);
        assert_eq!(merged.rows[1].len(), 2);
        assert_eq!(merged.get(1, "B"), Some("2"));
        assert_eq!(merged.get(0, "Z"), None);
    }

    #[test]
    fn test_chunk_result_tables() {
        let none = ChunkResult::new(1, "doc_chunk_1.pdf", UnitOutcome::NoTable);
        assert!(!none.has_table());

        let failed = ChunkResult::new(
            2,
            "doc_chunk_2.pdf",
            UnitOutcome::Failed { reason: "timeout".into(), attempts: 3 },
        );
        assert!(failed.is_failed());
        assert!(failed.tables().is_empty());
    }
}
