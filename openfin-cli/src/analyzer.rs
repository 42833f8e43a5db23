use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use openfin_ingest::AnalyzeResponse;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::AnalyzerSection;
use crate::staging::StagedObject;

/// Remote table-extraction service.
///
/// Block ids are only meaningful within one response; callers must not
/// correlate them across calls.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, object: &StagedObject) -> Result<AnalyzeResponse>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object<'a> {
    bucket: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DocumentLocation<'a> {
    s3_object: S3Object<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AnalyzeDocumentRequest<'a> {
    document: DocumentLocation<'a>,
    feature_types: &'a [String],
}

/// JSON `AnalyzeDocument` over HTTP.
///
/// Request signing is left to whatever sits at `endpoint`; this client only
/// adds a bearer token when one is configured.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    feature_types: Vec<String>,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, feature_types: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build analyzer http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
            feature_types,
        })
    }

    pub fn from_config(section: &AnalyzerSection) -> Result<Self> {
        let token = match &section.api_key_env {
            Some(var) => {
                let token = std::env::var(var).ok().filter(|t| !t.trim().is_empty());
                if token.is_none() {
                    debug!(var = %var, "analyzer token variable not set, sending unauthenticated requests");
                }
                token
            }
            None => None,
        };
        Self::new(
            section.endpoint.clone(),
            token,
            section.feature_types.clone(),
            Duration::from_secs(section.timeout_secs),
        )
    }

    fn request_body<'a>(&'a self, object: &'a StagedObject) -> AnalyzeDocumentRequest<'a> {
        AnalyzeDocumentRequest {
            document: DocumentLocation {
                s3_object: S3Object {
                    bucket: &object.bucket,
                    name: &object.key,
                },
            },
            feature_types: &self.feature_types,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-amz-json-1.1"));
        headers.insert("X-Amz-Target", HeaderValue::from_static("Textract.AnalyzeDocument"));
        if let Some(token) = &self.token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        Ok(headers)
    }
}

#[async_trait]
impl DocumentAnalyzer for HttpAnalyzer {
    async fn analyze(&self, object: &StagedObject) -> Result<AnalyzeResponse> {
        let body = serde_json::to_vec(&self.request_body(object)).context("serialize analyze request")?;

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .body(body)
            .send()
            .await
            .context("analyze request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("analyzer error: {status} {txt}");
        }

        let bytes = resp.bytes().await.context("read analyze response")?;
        serde_json::from_slice(&bytes).context("parse analyze response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(token: Option<&str>) -> HttpAnalyzer {
        HttpAnalyzer::new(
            "http://127.0.0.1:8787/textract",
            token.map(str::to_string),
            vec!["TABLES".to_string(), "FORMS".to_string()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let a = analyzer(None);
        let object = StagedObject {
            bucket: "statements".to_string(),
            key: "nu_chunk_1.pdf".to_string(),
        };
        let json = serde_json::to_value(a.request_body(&object)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Document": {"S3Object": {"Bucket": "statements", "Name": "nu_chunk_1.pdf"}},
                "FeatureTypes": ["TABLES", "FORMS"]
            })
        );
    }

    #[test]
    fn test_headers_carry_target_and_optional_token() {
        let anonymous = analyzer(None).headers().unwrap();
        assert_eq!(anonymous["X-Amz-Target"], "Textract.AnalyzeDocument");
        assert!(anonymous.get(AUTHORIZATION).is_none());

        let authed = analyzer(Some("abc")).headers().unwrap();
        assert_eq!(authed[AUTHORIZATION], "Bearer abc");
    }
}
