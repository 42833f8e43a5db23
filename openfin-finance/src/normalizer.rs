//! Apply an institution profile to a merged raw table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use openfin_core::{Direction, Institution, MergedTable, NormalizedTransaction};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::fields::{money_tokens, parse_date, parse_installments, parse_money, parse_percent};
use crate::profile::{column_key, profile, ColumnRule, FieldKind, InstitutionProfile};

/// A row excluded from the output, with its 1-based position in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Continuation rows without the profile's required cell
    pub skipped_rows: usize,
    /// Non-empty cells that did not parse and were left null
    pub unresolved_fields: usize,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedStatement {
    pub transactions: Vec<NormalizedTransaction>,
    pub report: NormalizationReport,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Text(String),
    Amount(Decimal),
    Rate(Decimal),
    Date(NaiveDate),
    Installments(u32, u32),
    Direction(Direction),
}

pub struct StatementNormalizer {
    profile: InstitutionProfile,
    installments: Regex,
}

impl StatementNormalizer {
    pub fn new(profile: InstitutionProfile) -> Result<Self> {
        let installments = Regex::new(profile.installment_pattern)
            .with_context(|| format!("installment pattern of {}", profile.institution))?;
        Ok(Self { profile, installments })
    }

    pub fn for_institution(institution: Institution) -> Result<Self> {
        Self::new(profile(institution).clone())
    }

    pub fn profile(&self) -> &InstitutionProfile {
        &self.profile
    }

    fn parse_field(&self, rule: &ColumnRule, raw: &str) -> Option<FieldValue> {
        let locale = self.profile.number;
        match rule.kind {
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::Money => parse_money(raw, locale).map(FieldValue::Amount),
            FieldKind::MoneyToken(n) => money_tokens(raw)
                .get(n)
                .and_then(|t| parse_money(t, locale))
                .map(FieldValue::Amount),
            FieldKind::Percent => parse_percent(raw, locale).map(FieldValue::Rate),
            FieldKind::Date => {
                parse_date(raw, self.profile.date_format, self.profile.month_names).map(FieldValue::Date)
            }
            FieldKind::Installments => match parse_installments(raw, &self.installments) {
                (Some(current), Some(total)) => Some(FieldValue::Installments(current, total)),
                _ => None,
            },
            FieldKind::Direction => Direction::from_label(raw).map(FieldValue::Direction),
        }
    }

    /// Normalize every row of `table`.
    ///
    /// Row order is preserved. Source columns the profile does not map are
    /// dropped; field parse failures leave the field null.
    pub fn normalize(&self, table: &MergedTable) -> NormalizedStatement {
        let keys: Vec<String> = table.columns.iter().map(|c| column_key(c)).collect();
        let position = |source: &str| {
            let key = column_key(source);
            keys.iter().position(|k| *k == key)
        };

        let rules: Vec<(&ColumnRule, usize)> = self
            .profile
            .columns
            .iter()
            .filter_map(|rule| match position(rule.source) {
                Some(col) => Some((rule, col)),
                None => {
                    debug!(institution = %self.profile.institution, column = rule.source, "column not in table");
                    None
                }
            })
            .collect();
        let required = self.profile.required_column.and_then(|c| position(c));

        let mut report = NormalizationReport {
            rows_in: table.rows.len(),
            ..NormalizationReport::default()
        };
        let mut transactions = Vec::with_capacity(table.rows.len());

        for (i, row) in table.rows.iter().enumerate() {
            let cell = |col: usize| row.get(col).map(|s| s.trim()).unwrap_or("");

            if let Some(col) = required {
                if cell(col).is_empty() {
                    report.skipped_rows += 1;
                    continue;
                }
            }

            let mut txn = NormalizedTransaction::new(self.profile.institution, self.profile.currency);
            for (rule, col) in &rules {
                let raw = cell(*col);
                if raw.is_empty() {
                    continue;
                }
                // A trailing figure the cell does not print is absent, not unparsed.
                if let FieldKind::MoneyToken(n) = rule.kind {
                    if n > 0 && money_tokens(raw).len() <= n {
                        continue;
                    }
                }
                match self.parse_field(rule, raw) {
                    Some(value) => apply(&mut txn, rule.target, value),
                    None => {
                        report.unresolved_fields += 1;
                        debug!(row = i + 1, column = rule.source, value = raw, "unparsed field left null");
                    }
                }
            }

            if self.profile.sign_from_direction {
                if let (Some(amount), Some(direction)) = (txn.amount, txn.direction) {
                    txn.amount = Some(match direction {
                        Direction::Debit => -amount.abs(),
                        Direction::Credit => amount.abs(),
                    });
                }
            }

            if let Err(mismatch) = txn.check_sign() {
                debug!(row = i + 1, %mismatch, "rejecting row");
                report.rejected.push(RejectedRow {
                    row: i + 1,
                    reason: mismatch.to_string(),
                });
                continue;
            }

            transactions.push(txn);
        }

        report.rows_out = transactions.len();
        NormalizedStatement { transactions, report }
    }
}

fn apply(txn: &mut NormalizedTransaction, target: &str, value: FieldValue) {
    match (target, value) {
        ("txn_date", FieldValue::Date(d)) => txn.txn_date = Some(d),
        ("description", FieldValue::Text(t)) => txn.description = t,
        ("category", FieldValue::Text(t)) => txn.category = Some(t),
        ("amount", FieldValue::Amount(a)) => txn.amount = Some(a),
        ("balance", FieldValue::Amount(a)) => txn.balance = Some(a),
        ("interest_rate", FieldValue::Rate(r)) => txn.interest_rate = Some(r),
        ("direction", FieldValue::Direction(d)) => txn.direction = Some(d),
        ("installments", FieldValue::Installments(current, total)) => {
            txn.current_installment = Some(current);
            txn.total_installments = Some(total);
        }
        (other, value) => {
            let text = match value {
                FieldValue::Text(t) => t,
                FieldValue::Amount(a) | FieldValue::Rate(a) => a.normalize().to_string(),
                FieldValue::Date(d) => d.to_string(),
                FieldValue::Installments(c, t) => format!("{c}/{t}"),
                FieldValue::Direction(d) => format!("{d:?}").to_lowercase(),
            };
            txn.metadata.insert(other.to_string(), text);
        }
    }
}
