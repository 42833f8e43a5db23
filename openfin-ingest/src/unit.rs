//! Document units: the page groups submitted to the service one call each.
//!
//! Units are named `<stem>_chunk_<n>.pdf` (1-based). The ordinal always comes
//! from that name so results can be put back in document order no matter
//! when each call finished.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUnit {
    pub ordinal: u32,
    /// File name, also used as the staging key
    pub id: String,
    pub path: PathBuf,
}

impl DocumentUnit {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("unit path has no file name: {}", path.display()))?
            .to_string();
        let ordinal = unit_ordinal(&id).with_context(|| format!("cannot derive unit ordinal from `{id}`"))?;
        Ok(Self { ordinal, id, path })
    }
}

pub fn unit_file_name(stem: &str, ordinal: u32) -> String {
    format!("{stem}_chunk_{ordinal}.pdf")
}

fn leading_digits(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn trailing_digits(s: &str) -> Option<u32> {
    let start = s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    s[start..].parse().ok()
}

/// Ordinal encoded in a unit identifier.
///
/// `statement_chunk_3.pdf` -> 3; falls back to a trailing number in the
/// file stem (`page-07.pdf` -> 7).
pub fn unit_ordinal(identifier: &str) -> Option<u32> {
    let name = Path::new(identifier)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(identifier);
    let stem = name.strip_suffix(".pdf").or_else(|| name.strip_suffix(".PDF")).unwrap_or(name);

    let lower = stem.to_ascii_lowercase();
    if let Some(pos) = lower.rfind("chunk_") {
        if let Some(n) = leading_digits(&stem[pos + "chunk_".len()..]) {
            return Some(n);
        }
    }
    trailing_digits(stem)
}

/// Build units from paginated files and order them by ordinal.
///
/// Two files claiming the same ordinal are rejected.
pub fn order_units(paths: Vec<PathBuf>) -> Result<Vec<DocumentUnit>> {
    let mut units = paths
        .into_iter()
        .map(DocumentUnit::from_path)
        .collect::<Result<Vec<_>>>()?;
    units.sort_by_key(|u| u.ordinal);
    for pair in units.windows(2) {
        if pair[0].ordinal == pair[1].ordinal {
            bail!("units `{}` and `{}` share ordinal {}", pair[0].id, pair[1].id, pair[0].ordinal);
        }
    }
    Ok(units)
}
