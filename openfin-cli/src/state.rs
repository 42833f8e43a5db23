use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `~/.openfin`; `OPENFIN_HOME` overrides it.
pub fn openfin_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("OPENFIN_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".openfin"))
}

pub fn ensure_openfin_home() -> Result<PathBuf> {
    let dir = openfin_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Decrypted copies, page units and per-unit CSVs land here unless configured otherwise.
pub fn default_work_dir() -> Result<PathBuf> {
    Ok(openfin_home()?.join("work"))
}

/// Root of the local staging store.
pub fn default_staging_root() -> Result<PathBuf> {
    Ok(openfin_home()?.join("staging"))
}
