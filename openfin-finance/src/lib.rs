//! openfin-finance: institution profiles, locale field parsing, statement
//! normalization and transaction sinks

pub mod fields;
pub mod normalizer;
pub mod profile;
pub mod sink;

pub use fields::{format_money, parse_date, parse_installments, parse_money, parse_percent, NumberLocale};
pub use normalizer::{NormalizationReport, NormalizedStatement, RejectedRow, StatementNormalizer};
pub use profile::{profile, profiles, ColumnRule, FieldKind, InstitutionProfile};
pub use sink::{CsvSink, TransactionSink};
