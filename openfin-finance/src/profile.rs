//! Declarative parsing rules, one profile per supported institution.
//!
//! Adding an institution means adding a profile here; the normalizer has no
//! institution-specific code paths.

use openfin_core::Institution;
use serde::Serialize;

use crate::fields::{NumberLocale, DEFAULT_INSTALLMENT_PATTERN, SPANISH_MONTHS};

/// How a source cell is parsed before it lands under its canonical name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Text,
    /// Whole cell is one amount
    Money,
    /// Only the n-th money token of the cell (0-based)
    MoneyToken(usize),
    Percent,
    Date,
    /// Fills both installment counters
    Installments,
    Direction,
}

/// Source column -> canonical field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnRule {
    pub source: &'static str,
    pub target: &'static str,
    pub kind: FieldKind,
}

const fn rule(source: &'static str, target: &'static str, kind: FieldKind) -> ColumnRule {
    ColumnRule { source, target, kind }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstitutionProfile {
    pub institution: Institution,
    pub currency: &'static str,
    pub number: NumberLocale,
    /// chrono format applied after month translation
    pub date_format: &'static str,
    /// Local month abbreviation -> English; empty when dates are numeric
    pub month_names: &'static [(&'static str, &'static str)],
    /// Regex with two captures: current and total installment
    pub installment_pattern: &'static str,
    pub columns: &'static [ColumnRule],
    /// Rows with this source cell empty are continuation lines and are skipped
    pub required_column: Option<&'static str>,
    /// Amount magnitude takes its sign from the direction column
    pub sign_from_direction: bool,
}

pub static NUBANK: InstitutionProfile = InstitutionProfile {
    institution: Institution::NuBank,
    currency: "COP",
    number: NumberLocale::COMMA_DECIMAL,
    date_format: "%d %b %Y",
    month_names: SPANISH_MONTHS,
    installment_pattern: r"(\d+)\s*de\s*(\d+)",
    columns: &[
        rule("Fecha", "txn_date", FieldKind::Date),
        rule("Descripción", "description", FieldKind::Text),
        rule("Valor", "amount", FieldKind::MoneyToken(0)),
        rule("Valor del mes", "amount_this_month", FieldKind::MoneyToken(0)),
        rule("Interés Porcentaje", "interest_rate", FieldKind::Percent),
        rule("del mes y valor", "interest_amount", FieldKind::MoneyToken(0)),
        rule("Total a pagar este mes", "total_to_pay_this_month", FieldKind::MoneyToken(0)),
        // The same cell carries the foreign-exchange commission as a second figure
        rule("Total a pagar este mes", "forex_commission", FieldKind::MoneyToken(1)),
        rule("Restante por pagar", "remaining_to_pay", FieldKind::Money),
        rule("Cuotas", "installments", FieldKind::Installments),
    ],
    required_column: None,
    sign_from_direction: false,
};

pub static ITAU: InstitutionProfile = InstitutionProfile {
    institution: Institution::Itau,
    currency: "COP",
    number: NumberLocale::COMMA_DECIMAL,
    date_format: "%d/%m/%y",
    month_names: &[],
    installment_pattern: r"(\d+)\s*/\s*(\d+)",
    columns: &[
        rule("Fecha", "txn_date", FieldKind::Date),
        rule("Descripción", "description", FieldKind::Text),
        rule("Valor original", "amount", FieldKind::Money),
        rule("Valor cuota", "amount_this_month", FieldKind::Money),
        rule("Tasa EA", "interest_rate", FieldKind::Percent),
        rule("Saldo pendiente", "remaining_to_pay", FieldKind::Money),
        rule("Cuotas", "installments", FieldKind::Installments),
    ],
    required_column: Some("Fecha"),
    sign_from_direction: false,
};

pub static DAVIVIENDA: InstitutionProfile = InstitutionProfile {
    institution: Institution::Davivienda,
    currency: "COP",
    number: NumberLocale::DOT_DECIMAL,
    date_format: "%d/%m/%Y",
    month_names: &[],
    installment_pattern: DEFAULT_INSTALLMENT_PATTERN,
    columns: &[
        rule("Fecha", "txn_date", FieldKind::Date),
        rule("Descripción", "description", FieldKind::Text),
        rule("Tipo", "direction", FieldKind::Direction),
        rule("Valor", "amount", FieldKind::Money),
        rule("Saldo", "balance", FieldKind::Money),
        rule("Categoría", "category", FieldKind::Text),
        rule("Cuotas", "installments", FieldKind::Installments),
        rule("Tasa", "interest_rate", FieldKind::Percent),
    ],
    required_column: Some("Fecha"),
    sign_from_direction: true,
};

/// Built-in profile for an institution; the caller always names the institution.
pub fn profile(institution: Institution) -> &'static InstitutionProfile {
    match institution {
        Institution::NuBank => &NUBANK,
        Institution::Itau => &ITAU,
        Institution::Davivienda => &DAVIVIENDA,
    }
}

pub fn profiles() -> Vec<&'static InstitutionProfile> {
    Institution::ALL.iter().map(|i| profile(*i)).collect()
}

/// Header name in comparable form: lower-case, accents folded, runs of
/// whitespace/punctuation collapsed to `_`.
pub fn column_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = false;
    for c in name.trim().to_lowercase().chars() {
        let c = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            _ => c,
        };
        if c.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_column_key_folds_case_and_accents() {
        assert_eq!(column_key("Descripción"), "descripcion");
        assert_eq!(column_key("  INTERÉS  Porcentaje "), "interes_porcentaje");
        assert_eq!(column_key("Total a pagar\neste mes"), "total_a_pagar_este_mes");
        assert_eq!(column_key("Número de Comprobante"), "numero_de_comprobante");
    }

    #[test]
    fn test_every_profile_is_well_formed() {
        for p in profiles() {
            assert!(Regex::new(p.installment_pattern).unwrap().captures_len() >= 3);
            for target in ["txn_date", "amount"] {
                let n = p.columns.iter().filter(|r| r.target == target).count();
                assert_eq!(n, 1, "{} {target}", p.institution);
            }
            assert_eq!(p.currency.len(), 3);
            if let Some(required) = p.required_column {
                assert!(p.columns.iter().any(|r| r.source == required));
            }
        }
    }

    #[test]
    fn test_profiles_cover_both_number_locales() {
        assert_eq!(profile(Institution::NuBank).number, NumberLocale::COMMA_DECIMAL);
        assert_eq!(profile(Institution::Itau).number, NumberLocale::COMMA_DECIMAL);
        assert_eq!(profile(Institution::Davivienda).number, NumberLocale::DOT_DECIMAL);
    }
}
