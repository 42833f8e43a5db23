//! Lenient parsers for locale-formatted statement fields.
//!
//! Every parser returns `None` instead of failing; a bad cell never aborts a
//! row or a batch.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

/// Decimal and thousands separators of a statement locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberLocale {
    pub decimal: char,
    pub thousands: char,
}

impl NumberLocale {
    /// `1.234.567,89` (es-CO, pt-BR, ...)
    pub const COMMA_DECIMAL: NumberLocale = NumberLocale {
        decimal: ',',
        thousands: '.',
    };
    /// `1,234,567.89` (en-US, ...)
    pub const DOT_DECIMAL: NumberLocale = NumberLocale {
        decimal: '.',
        thousands: ',',
    };
}

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Matches "3/12", "3 / 12" and "3 de 12"
pub const DEFAULT_INSTALLMENT_PATTERN: &str = r"(\d+)\s*(?:/|de)\s*(\d+)";

/// Spanish three-letter month abbreviations as printed on statements.
pub const SPANISH_MONTHS: &[(&str, &str)] = &[
    ("ENE", "Jan"),
    ("FEB", "Feb"),
    ("MAR", "Mar"),
    ("ABR", "Apr"),
    ("MAY", "May"),
    ("JUN", "Jun"),
    ("JUL", "Jul"),
    ("AGO", "Aug"),
    ("SEP", "Sep"),
    ("SET", "Sep"),
    ("OCT", "Oct"),
    ("NOV", "Nov"),
    ("DIC", "Dec"),
];

fn parse_number(raw: &str, locale: NumberLocale) -> Option<Decimal> {
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    // Accounting negatives: (1.234,00)
    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }

    let cleaned: String = s
        .chars()
        .filter(|c| *c != locale.thousands)
        .map(|c| if c == locale.decimal { '.' } else { c })
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }

    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a money cell such as `$74.497,45` into a two-decimal amount.
pub fn parse_money(raw: &str, locale: NumberLocale) -> Option<Decimal> {
    parse_number(raw, locale).map(|v| v.round_dp(2))
}

/// Parse a percentage such as `2,45%` into a fraction (`0.0245`).
pub fn parse_percent(raw: &str, locale: NumberLocale) -> Option<Decimal> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
    parse_number(trimmed, locale).map(|v| v / Decimal::ONE_HUNDRED)
}

/// Render an amount the way the locale prints it, e.g. `-$1.234,50`.
pub fn format_money(value: Decimal, locale: NumberLocale, symbol: Option<&str>) -> String {
    let value = value.round_dp(2);
    let digits = format!("{:.2}", value.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(locale.thousands);
        }
        grouped.push(c);
    }

    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    format!(
        "{sign}{}{grouped}{}{frac_part}",
        symbol.unwrap_or(""),
        locale.decimal
    )
}

/// Money tokens of a cell, keeping a detached symbol with its number.
///
/// `"$ 74.497,45 $1.200,00"` -> `["$74.497,45", "$1.200,00"]`
pub fn money_tokens(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending = String::new();
    for token in raw.split_whitespace() {
        let bare = token
            .chars()
            .all(|c| CURRENCY_SYMBOLS.contains(&c) || c == '-' || c == '+');
        if bare {
            pending.push_str(token);
            continue;
        }
        out.push(format!("{pending}{token}"));
        pending.clear();
    }
    out
}

fn translate_months(raw: &str, months: &[(&str, &str)]) -> Option<String> {
    let mut out = Vec::new();
    for token in raw.split_whitespace() {
        let token = token.trim_end_matches('.');
        if token.chars().all(|c| c.is_alphabetic()) {
            let upper = token.to_uppercase();
            let translated = months.iter().find(|(local, _)| *local == upper).map(|(_, en)| *en)?;
            out.push(translated.to_string());
        } else {
            out.push(token.to_string());
        }
    }
    Some(out.join(" "))
}

/// Parse a statement date with a chrono format string.
///
/// When `months` is non-empty, alphabetic tokens are first translated through
/// it (`17 MAY 2025` -> `17 May 2025`); an unknown abbreviation gives `None`.
pub fn parse_date(raw: &str, format: &str, months: &[(&str, &str)]) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let text = if months.is_empty() {
        raw.to_string()
    } else {
        translate_months(raw, months)?
    };
    NaiveDate::parse_from_str(&text, format).ok()
}

/// Current and total installment from free text; `(None, None)` without a match.
pub fn parse_installments(raw: &str, pattern: &Regex) -> (Option<u32>, Option<u32>) {
    let Some(caps) = pattern.captures(raw) else {
        return (None, None);
    };
    let current = caps.get(1).and_then(|m| m.as_str().parse().ok());
    let total = caps.get(2).and_then(|m| m.as_str().parse().ok());
    match (current, total) {
        (Some(c), Some(t)) => (Some(c), Some(t)),
        _ => (None, None),
    }
}
