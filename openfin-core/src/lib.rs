//! openfin-core: shared data model for statement extraction and normalization

pub mod institution;
pub mod table;
pub mod transaction;

pub use institution::{Institution, UnknownInstitution};
pub use table::{Cell, ChunkResult, ExtractedTable, MergedTable, TableRow, UnitOutcome};
pub use transaction::{Direction, NormalizedTransaction, SignMismatch};
