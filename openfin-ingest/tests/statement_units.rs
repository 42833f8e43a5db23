use openfin_ingest::{
    assemble, parse_csv, reconstruct_unit, render_merged, render_tables, AnalyzeResponse, DocumentUnit,
};
use pretty_assertions::assert_eq;

/// A body page: header + two transactions, one with a comma inside the description.
fn body_page(first: &str, second: &str) -> String {
    format!(
        r#"{{"Blocks": [
        {{"BlockType": "PAGE", "Id": "page", "Relationships": [{{"Type": "CHILD", "Ids": ["tbl"]}}]}},
        {{"BlockType": "TABLE", "Id": "tbl", "Relationships": [{{"Type": "CHILD", "Ids": ["h1", "h2", "r1", "r2", "s1", "s2"]}}]}},
        {{"BlockType": "CELL", "Id": "h1", "RowIndex": 1, "ColumnIndex": 1, "Confidence": 99.0, "Relationships": [{{"Type": "CHILD", "Ids": ["wh1"]}}]}},
        {{"BlockType": "CELL", "Id": "h2", "RowIndex": 1, "ColumnIndex": 2, "Confidence": 99.0, "Relationships": [{{"Type": "CHILD", "Ids": ["wh2"]}}]}},
        {{"BlockType": "CELL", "Id": "r1", "RowIndex": 2, "ColumnIndex": 1, "Confidence": 95.0, "Relationships": [{{"Type": "CHILD", "Ids": ["wd1"]}}]}},
        {{"BlockType": "CELL", "Id": "r2", "RowIndex": 2, "ColumnIndex": 2, "Confidence": 91.0, "Relationships": [{{"Type": "CHILD", "Ids": ["wv1a", "wv1b"]}}]}},
        {{"BlockType": "CELL", "Id": "s1", "RowIndex": 3, "ColumnIndex": 1, "Confidence": 95.0, "Relationships": [{{"Type": "CHILD", "Ids": ["wd2"]}}]}},
        {{"BlockType": "CELL", "Id": "s2", "RowIndex": 3, "ColumnIndex": 2, "Confidence": 42.0}},
        {{"BlockType": "WORD", "Id": "wh1", "Text": "Descripción"}},
        {{"BlockType": "WORD", "Id": "wh2", "Text": "Valor"}},
        {{"BlockType": "WORD", "Id": "wd1", "Text": "{first}"}},
        {{"BlockType": "WORD", "Id": "wv1a", "Text": "$1.234,50"}},
        {{"BlockType": "WORD", "Id": "wv1b", "Text": "COP"}},
        {{"BlockType": "WORD", "Id": "wd2", "Text": "{second}"}}
    ]}}"#
    )
}

const COVER_PAGE: &str = r#"{"Blocks": [
    {"BlockType": "PAGE", "Id": "page"},
    {"BlockType": "LINE", "Id": "l1", "Text": "Extracto de tarjeta de crédito"}
]}"#;

const SUMMARY_PAGE: &str = r#"{"Blocks": [
    {"BlockType": "TABLE", "Id": "t", "Relationships": [{"Type": "CHILD", "Ids": ["c"]}]},
    {"BlockType": "CELL", "Id": "c", "RowIndex": 1, "ColumnIndex": 1, "Relationships": [{"Type": "CHILD", "Ids": ["w"]}]},
    {"BlockType": "WORD", "Id": "w", "Text": "Resumen"}
]}"#;

fn unit_result(name: &str, json: &str) -> openfin_core::ChunkResult {
    let unit = DocumentUnit::from_path(name).unwrap();
    let resp: AnalyzeResponse = serde_json::from_str(json).unwrap();
    reconstruct_unit(unit.ordinal, &unit.id, &resp.blocks)
}

#[test]
fn test_document_assembles_in_unit_order() {
    // Results arrive out of order, as they would from parallel calls.
    let results = vec![
        unit_result("extracto_chunk_4.pdf", SUMMARY_PAGE),
        unit_result("extracto_chunk_3.pdf", &body_page("UBER,TRIP", "NETFLIX")),
        unit_result("extracto_chunk_1.pdf", COVER_PAGE),
        unit_result("extracto_chunk_2.pdf", &body_page("RAPPI", "EXITO")),
    ];

    let (merged, report) = assemble(&results);

    assert_eq!(merged.columns, vec!["Descripción".to_string(), "Valor".to_string()]);
    let descriptions: Vec<&str> = merged.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(descriptions, vec!["RAPPI", "EXITO", "UBER,TRIP", "NETFLIX"]);
    assert_eq!(merged.get(0, "Valor"), Some("$1.234,50 COP"));
    assert_eq!(merged.get(1, "Valor"), Some(""));

    assert_eq!(report.units, 4);
    assert_eq!(report.units_without_table, 1);
    assert_eq!(report.tables_kept, 2);
    assert_eq!(report.tables_dropped, 1);
}

#[test]
fn test_unit_csv_round_trip_keeps_commas() {
    let result = unit_result("extracto_chunk_3.pdf", &body_page("UBER,TRIP", "NETFLIX"));
    let text = render_tables(result.tables()).unwrap();
    assert!(text.contains("\"UBER,TRIP\""));

    let rows = parse_csv(&text).unwrap();
    assert_eq!(rows, result.tables()[0].to_grid());
}

#[test]
fn test_merged_csv_has_header_first() {
    let results = vec![unit_result("x_chunk_1.pdf", &body_page("A", "B"))];
    let (merged, _) = assemble(&results);
    let text = render_merged(&merged).unwrap();
    assert_eq!(text.lines().next(), Some("Descripción,Valor"));
    assert_eq!(parse_csv(&text).unwrap().len(), 3);
}
