//! NYC open-data API client
//!
//! Issues one GET per dataset against `{base_url}/resource/{dataset}.json`
//! and decodes the JSON array response. No pagination parameters, no
//! authentication, no retry.
//!
//! The underlying `reqwest::Client` is built once per process and shared by
//! every `NycOpenDataClient`.

use nycs_common::config::ApiConfig;
use nycs_common::{School, ScoreRecord};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("nycs-browser/", env!("CARGO_PKG_VERSION"));

/// API client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failure (connect, timeout, reading the body)
    #[error("Network error: {0}")]
    Network(String),

    /// API returned a non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body was not the expected JSON shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// True for failures that happened before a body could be decoded
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Api(..))
    }
}

fn shared_http_client() -> Result<&'static reqwest::Client, FetchError> {
    static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client);
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Network(e.to_string()))?;

    // Another caller may have initialized it first
    Ok(HTTP_CLIENT.get_or_init(|| client))
}

/// Client for the school directory and SAT results datasets
#[derive(Debug, Clone)]
pub struct NycOpenDataClient {
    schools_url: String,
    scores_url: String,
    timeout: Option<Duration>,
}

impl NycOpenDataClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            schools_url: config.schools_url(),
            scores_url: config.scores_url(),
            timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Fetch the full school directory
    pub async fn fetch_schools(&self) -> Result<Vec<School>, FetchError> {
        self.get_json(&self.schools_url, "schools").await
    }

    /// Fetch the full SAT results dataset
    pub async fn fetch_scores(&self) -> Result<Vec<ScoreRecord>, FetchError> {
        self.get_json(&self.scores_url, "scores").await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        dataset: &'static str,
    ) -> Result<Vec<T>, FetchError> {
        tracing::debug!(dataset, url = %url, "Querying open-data API");

        let mut request = shared_http_client()?.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(status.as_u16(), error_text));
        }

        // Read as text first so a bad body is reported as Decode, not Network
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let records: Vec<T> =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::info!(dataset, count = records.len(), "Open-data fetch successful");

        Ok(records)
    }
}
