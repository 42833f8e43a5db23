//! Object staging: a unit file has to be somewhere the service can read it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Locator handed to the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObject {
    pub bucket: String,
    pub key: String,
}

#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<StagedObject>;
}

fn object_key(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("no usable file name in {}", path.display()))
}

/// Copies units into `<root>/<bucket>/`.
pub struct LocalStagingStore {
    root: PathBuf,
    bucket: String,
}

impl LocalStagingStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl StagingStore for LocalStagingStore {
    async fn upload(&self, path: &Path) -> Result<StagedObject> {
        let key = object_key(path)?;
        let dir = self.root.join(&self.bucket);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
        let dest = dir.join(&key);
        tokio::fs::copy(path, &dest)
            .await
            .with_context(|| format!("copy {} to {}", path.display(), dest.display()))?;
        Ok(StagedObject {
            bucket: self.bucket.clone(),
            key,
        })
    }
}

/// `PUT <endpoint>/<bucket>/<key>`
pub struct HttpStagingStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpStagingStore {
    pub fn new(endpoint: &str, bucket: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build staging http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl StagingStore for HttpStagingStore {
    async fn upload(&self, path: &Path) -> Result<StagedObject> {
        let key = object_key(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;

        let resp = self
            .client
            .put(self.object_url(&key))
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await
            .context("staging request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("staging error: {status} {txt}");
        }

        Ok(StagedObject {
            bucket: self.bucket.clone(),
            key,
        })
    }
}
