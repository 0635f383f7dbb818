//! Convention search API client
//!
//! Wraps the upstream listing endpoint: `GET <base>?msg=<keyword>` returning
//! a `{code, data}` envelope. The upstream does not distinguish "no matches"
//! from "upstream error", so callers treat every [`ApiError`] the same; the
//! variants exist so logs can tell them apart.

use futures_util::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::record::{ConventionRecord, RawRecord};

/// Envelope code the upstream uses for success.
const CODE_OK: i64 = 200;

/// Referer the upstream image host expects for logo downloads.
const LOGO_REFERER: &str = "https://cp.allcpp.cn/";

/// Request timeout for search and logo fetches.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned code {0}")]
    Status(i64),

    #[error("upstream returned no results")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    code: i64,
    #[serde(default)]
    data: Option<Vec<RawRecord>>,
}

/// Client for the convention search API.
#[derive(Clone)]
pub struct ConventionClient {
    client: reqwest::Client,
    base_url: String,
}

impl ConventionClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Search for conventions matching a keyword. Success requires the OK
    /// envelope code and a non-empty data array; a single attempt, never
    /// retried.
    pub async fn search(&self, keyword: &str) -> Result<Vec<ConventionRecord>, ApiError> {
        let envelope: SearchEnvelope = self
            .client
            .get(&self.base_url)
            .query(&[("msg", keyword)])
            .send()
            .await?
            .json()
            .await?;

        if envelope.code != CODE_OK {
            return Err(ApiError::Status(envelope.code));
        }

        let data = envelope.data.unwrap_or_default();
        if data.is_empty() {
            return Err(ApiError::Empty);
        }

        debug!("Search {:?}: {} records", keyword, data.len());
        Ok(data.into_iter().map(ConventionRecord::from).collect())
    }

    /// Fan out one search per keyword and aggregate the results. Each
    /// record is tagged with the keyword it was found under. A failing
    /// keyword contributes nothing instead of aborting the batch.
    pub async fn search_many(&self, keywords: &[String]) -> Vec<ConventionRecord> {
        let futures = keywords.iter().map(|keyword| async move {
            match self.search(keyword).await {
                Ok(records) => records
                    .into_iter()
                    .map(|mut r| {
                        r.keyword = Some(keyword.clone());
                        r
                    })
                    .collect(),
                Err(e) => {
                    warn!("Batch search {:?} failed: {}", keyword, e);
                    Vec::new()
                }
            }
        });

        join_all(futures).await.into_iter().flatten().collect()
    }

    /// Best-effort fetch of a record's logo image. The upstream image host
    /// rejects requests without its referer.
    pub async fn fetch_logo(&self, url: &str) -> Option<Vec<u8>> {
        if url.is_empty() {
            return None;
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, LOGO_REFERER)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        response.bytes().await.ok().map(|b| b.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let json = r#"{"code":200,"data":[{"name":"CP30","address":"上海"}]}"#;
        let env: SearchEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.code, CODE_OK);
        assert_eq!(env.data.unwrap().len(), 1);
    }

    #[test]
    fn test_envelope_missing_data() {
        let json = r#"{"code":200}"#;
        let env: SearchEnvelope = serde_json::from_str(json).unwrap();
        assert!(env.data.is_none());
    }

    #[test]
    fn test_envelope_error_code() {
        let json = r#"{"code":500,"data":[]}"#;
        let env: SearchEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.code, 500);
    }

    #[test]
    fn test_envelope_extra_fields_ignored() {
        let json = r#"{"code":200,"msg":"ok","data":[]}"#;
        let env: SearchEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.code, 200);
        assert!(env.data.unwrap().is_empty());
    }
}
