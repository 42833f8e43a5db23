//! Hand normalized transactions to their destination.

use anyhow::{Context, Result};
use openfin_core::{Institution, NormalizedTransaction};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Destination of a document's normalized transactions.
pub trait TransactionSink: Send + Sync {
    /// Persist `txns` for one document and return where they went.
    fn write(&self, institution: Institution, document: &str, txns: &[NormalizedTransaction]) -> Result<String>;
}

/// Column order of [`CsvTransactionRow`], written even when there are no rows
pub const CSV_HEADER: [&str; 12] = [
    "institution",
    "txn_date",
    "amount",
    "currency",
    "description",
    "category",
    "balance",
    "direction",
    "current_installment",
    "total_installments",
    "interest_rate",
    "metadata",
];

/// Flat CSV shape of a normalized transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvTransactionRow {
    pub institution: String,
    pub txn_date: Option<String>,
    pub amount: Option<String>,
    pub currency: String,
    pub description: String,
    pub category: Option<String>,
    pub balance: Option<String>,
    pub direction: Option<String>,
    pub current_installment: Option<u32>,
    pub total_installments: Option<u32>,
    pub interest_rate: Option<String>,
    /// JSON object
    pub metadata: String,
}

impl CsvTransactionRow {
    pub fn from_transaction(txn: &NormalizedTransaction) -> Result<Self> {
        Ok(Self {
            institution: txn.institution.tag().to_string(),
            txn_date: txn.txn_date.map(|d| d.to_string()),
            amount: txn.amount.map(|a| a.to_string()),
            currency: txn.currency.clone(),
            description: txn.description.clone(),
            category: txn.category.clone(),
            balance: txn.balance.map(|b| b.to_string()),
            direction: txn.direction.map(|d| format!("{d:?}").to_lowercase()),
            current_installment: txn.current_installment,
            total_installments: txn.total_installments,
            interest_rate: txn.interest_rate.map(|r| r.normalize().to_string()),
            metadata: serde_json::to_string(&txn.metadata).context("serializing metadata")?,
        })
    }
}

/// Writes `<dir>/<institution>_<document stem>.csv`.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, institution: Institution, document: &str) -> PathBuf {
        let stem = Path::new(document)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(document);
        self.dir.join(format!("{}_{stem}.csv", institution.tag()))
    }
}

impl TransactionSink for CsvSink {
    fn write(&self, institution: Institution, document: &str, txns: &[NormalizedTransaction]) -> Result<String> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(institution, document);

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        wtr.write_record(CSV_HEADER)?;
        for txn in txns {
            wtr.serialize(CsvTransactionRow::from_transaction(txn)?)?;
        }
        wtr.flush().with_context(|| format!("writing {}", path.display()))?;

        Ok(path.display().to_string())
    }
}

/// Read back a file written by [`CsvSink`].
pub fn read_transaction_rows(path: impl AsRef<Path>) -> Result<Vec<CsvTransactionRow>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
