//! openfin-ingest: OCR block graph -> tables -> one merged table per document.

pub mod assemble;
pub mod csv_render;
pub mod reconstruct;
pub mod textract;
pub mod unit;

pub use assemble::{assemble, AssemblyReport};
pub use csv_render::{parse_csv, read_merged, render_merged, render_tables, write_merged};
pub use reconstruct::{reconstruct_tables, reconstruct_unit};
pub use textract::{AnalyzeResponse, Block, BlockKind};
pub use unit::{order_units, unit_file_name, unit_ordinal, DocumentUnit};
