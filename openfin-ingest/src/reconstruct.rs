//! Rebuild row/column grids from the service's flat block graph.
//!
//! Traversal is a two-level group-by over CHILD edges:
//!   TABLE -> CELL (grouped by row index, then column index)
//!   CELL  -> WORD / SELECTION_ELEMENT (concatenated into the cell text)

use std::collections::{BTreeMap, HashMap};

use openfin_core::{Cell, ChunkResult, ExtractedTable, TableRow, UnitOutcome};
use tracing::debug;

use crate::textract::{Block, BlockKind, SelectionStatus};

/// Id lookup over one response's blocks.
pub struct BlockIndex<'a> {
    by_id: HashMap<&'a str, &'a Block>,
    tables: Vec<&'a Block>,
}

impl<'a> BlockIndex<'a> {
    pub fn new(blocks: &'a [Block]) -> Self {
        let mut by_id = HashMap::with_capacity(blocks.len());
        let mut tables = Vec::new();
        for block in blocks {
            by_id.insert(block.id.as_str(), block);
            if block.kind == BlockKind::Table {
                tables.push(block);
            }
        }
        Self { by_id, tables }
    }

    pub fn get(&self, id: &str) -> Option<&'a Block> {
        self.by_id.get(id).copied()
    }

    /// TABLE blocks in encounter order
    pub fn tables(&self) -> &[&'a Block] {
        &self.tables
    }

    fn children(&self, block: &'a Block) -> impl Iterator<Item = &'a Block> + '_ {
        block.child_ids().filter_map(move |id| {
            let child = self.get(id);
            if child.is_none() {
                debug!(parent = %block.id, child = id, "dangling relationship id");
            }
            child
        })
    }
}

/// Text of a cell: words joined by single spaces, selected marks as "X".
pub fn cell_text<'a>(cell: &'a Block, index: &BlockIndex<'a>) -> String {
    let mut parts: Vec<String> = Vec::new();
    for child in index.children(cell) {
        match child.kind {
            BlockKind::Word => {
                // OCR sometimes splits glyphs of one word with spaces
                let word: String = child
                    .text
                    .as_deref()
                    .unwrap_or("")
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                if !word.is_empty() {
                    parts.push(word);
                }
            }
            BlockKind::SelectionMark => {
                if child.selection_status == Some(SelectionStatus::Selected) {
                    parts.push("X".to_string());
                }
            }
            _ => {}
        }
    }
    parts.join(" ").trim().to_string()
}

fn table_from_block<'a>(table: &'a Block, index: &BlockIndex<'a>) -> ExtractedTable {
    let mut rows: BTreeMap<u32, BTreeMap<u32, Cell>> = BTreeMap::new();

    for child in index.children(table) {
        if child.kind != BlockKind::Cell {
            continue;
        }
        let (Some(row), Some(col)) = (child.row_index, child.column_index) else {
            debug!(cell = %child.id, "cell without row/column index");
            continue;
        };
        rows.entry(row).or_default().insert(
            col,
            Cell {
                text: cell_text(child, index),
                confidence: child.confidence,
            },
        );
    }

    ExtractedTable {
        rows: rows
            .into_iter()
            .map(|(index, cells)| TableRow { index, cells })
            .collect(),
    }
}

/// Every table in the response, in the order their TABLE blocks appear.
///
/// TABLE blocks that resolve to no cells are skipped.
pub fn reconstruct_tables(blocks: &[Block]) -> Vec<ExtractedTable> {
    let index = BlockIndex::new(blocks);
    index
        .tables()
        .iter()
        .map(|&table| table_from_block(table, &index))
        .filter(|table| !table.is_empty())
        .collect()
}

/// Reconstruct one unit's response into its chunk result.
///
/// A response without any table is a valid `NoTable` outcome, not an error.
pub fn reconstruct_unit(ordinal: u32, unit_id: &str, blocks: &[Block]) -> ChunkResult {
    let tables = reconstruct_tables(blocks);
    if tables.is_empty() {
        debug!(unit = unit_id, "no table found");
        return ChunkResult::new(ordinal, unit_id, UnitOutcome::NoTable);
    }
    for (i, table) in tables.iter().enumerate() {
        let low = table.low_confidence_cells(50.0);
        if !low.is_empty() {
            debug!(unit = unit_id, table = i, cells = low.len(), "low-confidence cells");
        }
    }
    ChunkResult::new(ordinal, unit_id, UnitOutcome::Tables(tables))
}
