//! Wire model of the table-extraction service's response.
//!
//! Expected JSON shape (one response per document unit):
//!   {"Blocks": [
//!     {"BlockType": "TABLE", "Id": "t1", "Relationships": [{"Type": "CHILD", "Ids": ["c1"]}]},
//!     {"BlockType": "CELL", "Id": "c1", "RowIndex": 1, "ColumnIndex": 1, "Confidence": 98.2, ...},
//!     {"BlockType": "WORD", "Id": "w1", "Text": "Fecha"},
//!     {"BlockType": "SELECTION_ELEMENT", "Id": "s1", "SelectionStatus": "SELECTED"}
//!   ]}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "TABLE")]
    Table,
    #[serde(rename = "CELL")]
    Cell,
    #[serde(rename = "WORD")]
    Word,
    #[serde(rename = "SELECTION_ELEMENT", alias = "SELECTION_MARK")]
    SelectionMark,
    /// PAGE, LINE, KEY_VALUE_SET, ...
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionStatus {
    #[serde(rename = "SELECTED")]
    Selected,
    #[serde(rename = "NOT_SELECTED")]
    NotSelected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    #[serde(rename = "CHILD")]
    Child,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: RelationshipKind,
    #[serde(rename = "Ids", default)]
    pub ids: Vec<String>,
}

/// One recognized element. Children are referenced by id, not nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    #[serde(rename = "BlockType")]
    pub kind: BlockKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_status: Option<SelectionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Block {
    fn bare(kind: BlockKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            row_index: None,
            column_index: None,
            relationships: Vec::new(),
            text: None,
            selection_status: None,
            confidence: None,
        }
    }

    fn with_children(mut self, children: &[&str]) -> Self {
        if !children.is_empty() {
            self.relationships.push(Relationship {
                kind: RelationshipKind::Child,
                ids: children.iter().map(|s| s.to_string()).collect(),
            });
        }
        self
    }

    pub fn table(id: impl Into<String>, cells: &[&str]) -> Self {
        Self::bare(BlockKind::Table, id).with_children(cells)
    }

    pub fn cell(id: impl Into<String>, row: u32, column: u32, children: &[&str]) -> Self {
        let mut b = Self::bare(BlockKind::Cell, id).with_children(children);
        b.row_index = Some(row);
        b.column_index = Some(column);
        b
    }

    pub fn word(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut b = Self::bare(BlockKind::Word, id);
        b.text = Some(text.into());
        b
    }

    pub fn selection_mark(id: impl Into<String>, selected: bool) -> Self {
        let mut b = Self::bare(BlockKind::SelectionMark, id);
        b.selection_status = Some(if selected {
            SelectionStatus::Selected
        } else {
            SelectionStatus::NotSelected
        });
        b
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Ids referenced through CHILD relationships, in order.
    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Child)
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }
}

/// Response envelope of one analyze call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(rename = "Blocks", default)]
    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_service_json() {
        let json = r#"{
            "DocumentMetadata": {"Pages": 1},
            "Blocks": [
                {"BlockType": "PAGE", "Id": "p1", "Relationships": [{"Type": "CHILD", "Ids": ["t1"]}]},
                {"BlockType": "TABLE", "Id": "t1", "Confidence": 99.5,
                 "Relationships": [{"Type": "CHILD", "Ids": ["c1"]}, {"Type": "MERGED_CELL", "Ids": ["m1"]}]},
                {"BlockType": "CELL", "Id": "c1", "RowIndex": 1, "ColumnIndex": 2,
                 "Relationships": [{"Type": "CHILD", "Ids": ["w1", "s1"]}]},
                {"BlockType": "WORD", "Id": "w1", "Text": "Valor"},
                {"BlockType": "SELECTION_ELEMENT", "Id": "s1", "SelectionStatus": "SELECTED"}
            ]
        }"#;

        let resp: AnalyzeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.blocks.len(), 5);
        assert_eq!(resp.blocks[0].kind, BlockKind::Other);
        assert_eq!(resp.blocks[1].child_ids().collect::<Vec<_>>(), vec!["c1"]);
        assert_eq!(resp.blocks[2].column_index, Some(2));
        assert_eq!(resp.blocks[4].kind, BlockKind::SelectionMark);
        assert_eq!(resp.blocks[4].selection_status, Some(SelectionStatus::Selected));
    }

    #[test]
    fn test_selection_mark_alias() {
        let b: Block =
            serde_json::from_str(r#"{"BlockType": "SELECTION_MARK", "Id": "s", "SelectionStatus": "NOT_SELECTED"}"#)
                .unwrap();
        assert_eq!(b.kind, BlockKind::SelectionMark);
        assert_eq!(b.selection_status, Some(SelectionStatus::NotSelected));
    }
}
