use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_openfin_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyzer: AnalyzerSection,
    pub staging: StagingSection,
    pub pipeline: PipelineSection,
    pub pdf: PdfSection,
}

/// Remote table-extraction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSection {
    /// URL accepting Textract-style `AnalyzeDocument` requests (usually a signing gateway)
    pub endpoint: String,
    /// Name of the environment variable holding a bearer token. The token itself
    /// is never written to this file.
    pub api_key_env: Option<String>,
    pub feature_types: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingKind {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSection {
    pub kind: StagingKind,
    pub bucket: String,
    /// Local store root (kind = "local"); defaults to ~/.openfin/staging
    pub root: Option<PathBuf>,
    /// Object store base URL (kind = "http")
    pub endpoint: Option<String>,
}

/// What a unit that exhausted its retries does to the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitFailurePolicy {
    /// Count it and treat it as a unit without a table
    #[default]
    Skip,
    /// Fail the whole document at the extraction stage
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Pages per unit
    pub unit_size: u32,
    /// Units in flight against the service at once
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub on_unit_failure: UnitFailurePolicy,
    pub work_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSection {
    pub qpdf_command: String,
}

impl Default for AnalyzerSection {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/textract".to_string(),
            api_key_env: Some("OPENFIN_ANALYZER_TOKEN".to_string()),
            feature_types: vec!["TABLES".to_string(), "FORMS".to_string()],
            timeout_secs: 120,
        }
    }
}

impl Default for StagingSection {
    fn default() -> Self {
        Self {
            kind: StagingKind::Local,
            bucket: "openfin-statements".to_string(),
            root: None,
            endpoint: None,
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            unit_size: 1,
            concurrency: 4,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8000,
            on_unit_failure: UnitFailurePolicy::Skip,
            work_dir: None,
            output_dir: None,
        }
    }
}

impl Default for PdfSection {
    fn default() -> Self {
        Self {
            qpdf_command: "qpdf".to_string(),
        }
    }
}

impl Config {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.unit_size == 0 {
            bail!("pipeline.unit_size must be at least 1");
        }
        if self.pipeline.concurrency == 0 {
            bail!("pipeline.concurrency must be at least 1");
        }
        if self.pipeline.max_attempts == 0 {
            bail!("pipeline.max_attempts must be at least 1");
        }
        if self.pipeline.backoff_max_ms < self.pipeline.backoff_base_ms {
            bail!("pipeline.backoff_max_ms must not be below pipeline.backoff_base_ms");
        }
        if self.staging.kind == StagingKind::Http && self.staging.endpoint.is_none() {
            bail!("staging.endpoint is required when staging.kind = \"http\"");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_openfin_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Missing file means defaults; sections and keys left out keep their defaults.
pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    cfg.validate().with_context(|| format!("invalid {}", p.display()))?;
    Ok(cfg)
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let p = config_path()?;
    let cfg = load_config_from(&p)?;
    if p.exists() {
        println!("# {}", p.display());
    } else {
        println!("# {} (not found, showing defaults)", p.display());
    }
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.pipeline.concurrency, 4);
        assert_eq!(cfg.pipeline.on_unit_failure, UnitFailurePolicy::Skip);
        assert_eq!(cfg.analyzer.feature_types, vec!["TABLES", "FORMS"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(
            &p,
            r#"
[pipeline]
concurrency = 2
on_unit_failure = "fail"

[staging]
kind = "http"
endpoint = "https://objects.internal"
"#,
        )
        .unwrap();

        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.pipeline.concurrency, 2);
        assert_eq!(cfg.pipeline.on_unit_failure, UnitFailurePolicy::Fail);
        assert_eq!(cfg.pipeline.max_attempts, 3);
        assert_eq!(cfg.staging.kind, StagingKind::Http);
        assert_eq!(cfg.staging.bucket, "openfin-statements");
        assert_eq!(cfg.pdf.qpdf_command, "qpdf");
    }

    #[test]
    fn test_saved_defaults_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        save_config_to(&Config::default(), &p).unwrap();
        assert_eq!(load_config_from(&p).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");

        fs::write(&p, "[pipeline]\nconcurrency = 0\n").unwrap();
        assert!(load_config_from(&p).is_err());

        fs::write(&p, "[staging]\nkind = \"http\"\n").unwrap();
        let err = load_config_from(&p).unwrap_err();
        assert!(format!("{err:#}").contains("staging.endpoint"));
    }
}
