//! reqwest-backed datastore transport.

use super::{DatastoreQuery, DatastoreTransport, FetchFault, Record};
use crate::config::{PipelineSettings, USER_AGENT};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    success: bool,
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    records: Vec<Record>,
}

/// Calls `datastore_search` over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpDatastore {
    client: Client,
    base_url: String,
}

impl HttpDatastore {
    /// Create a transport for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create a transport from pipeline settings
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_settings(settings: &PipelineSettings) -> reqwest::Result<Self> {
        Self::new(settings.api_base_url.clone(), settings.api_timeout())
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> FetchFault {
    if e.is_timeout() {
        FetchFault::Timeout
    } else if e.is_connect() {
        FetchFault::Unreachable(e.to_string())
    } else if let Some(status) = e.status() {
        FetchFault::Status(status.as_u16())
    } else if e.is_decode() || e.is_body() {
        FetchFault::InvalidResponse(e.to_string())
    } else {
        FetchFault::Other(e.to_string())
    }
}

/// Unwrap the CKAN envelope, rejecting anything without `success: true`.
fn unwrap_envelope(envelope: SearchEnvelope) -> Result<Vec<Record>, FetchFault> {
    if !envelope.success {
        return Err(FetchFault::InvalidResponse(
            "response is missing success=true".to_string(),
        ));
    }
    envelope
        .result
        .map(|r| r.records)
        .ok_or_else(|| FetchFault::InvalidResponse("response has no result".to_string()))
}

#[async_trait]
impl DatastoreTransport for HttpDatastore {
    async fn search(&self, query: &DatastoreQuery) -> Result<Vec<Record>, FetchFault> {
        let limit = query.limit.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("resource_id", query.resource_id.as_str()),
                ("limit", limit.as_str()),
                ("q", query.q.as_str()),
            ])
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFault::Status(status.as_u16()));
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        let records = unwrap_envelope(envelope)?;

        debug!(
            resource = %query.resource_id,
            records = records.len(),
            "Datastore search completed"
        );
        Ok(records)
    }
}
