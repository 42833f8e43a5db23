//! End-to-end over the library seams: reconstructed unit tables -> assembly ->
//! profile normalization -> CSV sink.

use openfin_core::{ChunkResult, ExtractedTable, Institution, UnitOutcome};
use openfin_finance::sink::read_transaction_rows;
use openfin_finance::{CsvSink, StatementNormalizer, TransactionSink};
use openfin_ingest::assemble;
use pretty_assertions::assert_eq;

const ITAU_HEADER: [&str; 8] = [
    "Fecha",
    "Número de Comprobante",
    "Descripción",
    "Valor original",
    "Tasa EA",
    "Valor cuota",
    "Saldo pendiente",
    "Cuotas",
];

fn body(ordinal: u32, rows: &[[&str; 8]]) -> ChunkResult {
    let mut grid: Vec<Vec<&str>> = vec![ITAU_HEADER.to_vec()];
    grid.extend(rows.iter().map(|r| r.to_vec()));
    ChunkResult::new(
        ordinal,
        format!("itau_chunk_{ordinal}.pdf"),
        UnitOutcome::Tables(vec![ExtractedTable::from_rows(&grid)]),
    )
}

#[test]
fn test_itau_statement_end_to_end() {
    let chunks = vec![
        // Summary table on the last page has a different shape.
        ChunkResult::new(
            4,
            "itau_chunk_4.pdf",
            UnitOutcome::Tables(vec![ExtractedTable::from_rows(&[
                vec!["Pago mínimo", "Pago total"],
                vec!["$120.000,00", "$1.500.000,00"],
            ])]),
        ),
        body(
            3,
            &[["20/06/25", "889", "NETFLIX.COM", "$44.900,00", "0%", "$44.900,00", "$0,00", "1/1"]],
        ),
        ChunkResult::new(1, "itau_chunk_1.pdf", UnitOutcome::NoTable),
        body(
            2,
            &[
                ["05/06/25", "123", "EXITO CALLE 80", "$150.000,00", "25,99%", "$25.000,00", "$125.000,00", "1/6"],
                ["", "", "COMPRA INTERNACIONAL", "", "", "", "", ""],
                ["07/06/25", "124", "RAPPI*RAPPI, BOG", "$32.450,50", "25,99%", "$32.450,50", "$0,00", "1/1"],
            ],
        ),
    ];

    let (merged, assembly) = assemble(&chunks);
    assert_eq!(assembly.tables_dropped, 1);
    assert_eq!(merged.len(), 4);

    let normalized = StatementNormalizer::for_institution(Institution::Itau)
        .unwrap()
        .normalize(&merged);
    assert_eq!(normalized.report.rows_in, 4);
    assert_eq!(normalized.report.skipped_rows, 1);
    assert_eq!(normalized.report.rows_out, 3);
    assert_eq!(normalized.report.unresolved_fields, 0);

    let descriptions: Vec<&str> = normalized
        .transactions
        .iter()
        .map(|t| t.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["EXITO CALLE 80", "RAPPI*RAPPI, BOG", "NETFLIX.COM"]);
    assert!(normalized.transactions.iter().all(|t| t.institution == Institution::Itau));

    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(dir.path());
    let location = sink
        .write(Institution::Itau, "Itau_extracto_TCR.pdf", &normalized.transactions)
        .unwrap();

    let rows = read_transaction_rows(&location).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].txn_date.as_deref(), Some("2025-06-05"));
    assert_eq!(rows[0].amount.as_deref(), Some("150000.00"));
    assert_eq!(rows[0].interest_rate.as_deref(), Some("0.2599"));
    assert_eq!(rows[0].current_installment, Some(1));
    assert_eq!(rows[0].total_installments, Some(6));
    assert_eq!(rows[1].description, "RAPPI*RAPPI, BOG");
    assert!(rows[0].metadata.contains("\"remaining_to_pay\":\"125000\""));
}
