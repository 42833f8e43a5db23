//! Canonical transaction record every institution profile normalizes into.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::institution::Institution;

/// Declared money direction of a statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "debit")]
    Debit,
    #[serde(rename = "credit")]
    Credit,
}

impl Direction {
    /// Read a direction label as printed on statements (Spanish or English).
    pub fn from_label(label: &str) -> Option<Direction> {
        let folded: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'á' => 'a',
                'é' => 'e',
                'í' => 'i',
                'ó' => 'o',
                'ú' => 'u',
                _ => c,
            })
            .filter(|c| c.is_alphanumeric())
            .collect();

        match folded.as_str() {
            "debit" | "debito" | "db" | "d" | "cargo" | "dr" => Some(Direction::Debit),
            "credit" | "credito" | "cr" | "c" | "abono" => Some(Direction::Credit),
            _ => None,
        }
    }
}

/// A transaction whose amount sign disagrees with its declared direction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount {amount} does not match declared direction {direction:?}")]
pub struct SignMismatch {
    pub amount: Decimal,
    pub direction: Direction,
}

/// Institution-agnostic statement line.
///
/// Parse failures of individual fields leave the field `None`; the row is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub institution: Institution,
    pub txn_date: Option<NaiveDate>,
    /// Signed; debits are negative. Two decimal places.
    pub amount: Option<Decimal>,
    pub currency: String,
    pub description: String,
    pub category: Option<String>,
    /// Running account balance, where the statement prints one
    pub balance: Option<Decimal>,
    pub direction: Option<Direction>,
    pub current_installment: Option<u32>,
    pub total_installments: Option<u32>,
    /// Fraction, e.g. 0.0245 for "2,45%"
    pub interest_rate: Option<Decimal>,
    pub metadata: BTreeMap<String, String>,
}

impl NormalizedTransaction {
    pub fn new(institution: Institution, currency: impl Into<String>) -> Self {
        Self {
            institution,
            txn_date: None,
            amount: None,
            currency: currency.into(),
            description: String::new(),
            category: None,
            balance: None,
            direction: None,
            current_installment: None,
            total_installments: None,
            interest_rate: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Debits must not be positive and credits must not be negative.
    ///
    /// Rows without a direction or without an amount always pass.
    pub fn check_sign(&self) -> Result<(), SignMismatch> {
        let (Some(amount), Some(direction)) = (self.amount, self.direction) else {
            return Ok(());
        };
        let ok = match direction {
            Direction::Debit => amount <= Decimal::ZERO,
            Direction::Credit => amount >= Decimal::ZERO,
        };
        if ok {
            Ok(())
        } else {
            Err(SignMismatch { amount, direction })
        }
    }
}
