//! Access to the data.gov.il datastore
//!
//! [`DatastoreTransport`] performs a single `datastore_search` call;
//! [`ResilientFetcher`] wraps a transport with bounded retry and attaches an
//! [`ErrorClassification`] to every failure it propagates.

pub mod classify;
pub mod fetcher;
pub mod http;

pub use classify::{classify, ErrorClassification, ErrorKind, Severity};
pub use fetcher::{FetchError, ResilientFetcher};
pub use http::HttpDatastore;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One datastore record as returned by CKAN
pub type Record = serde_json::Map<String, serde_json::Value>;

/// What the transport observed when a call failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchFault {
    /// Request timed out
    #[error("request timed out")]
    Timeout,
    /// Connection could not be established
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    /// Non-success HTTP status
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    /// Envelope missing `success: true` or not decodable
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
    /// Query rejected before any call was made
    #[error("invalid query: {0}")]
    InvalidInput(String),
    /// Anything else
    #[error("upstream error: {0}")]
    Other(String),
}

/// Parameters of one `datastore_search` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatastoreQuery {
    /// Resource to search
    pub resource_id: String,
    /// Maximum number of records
    pub limit: u32,
    /// Full-text query (a normalized plate)
    pub q: String,
}

impl DatastoreQuery {
    /// Build a query
    #[must_use]
    pub fn new(resource_id: impl Into<String>, limit: u32, q: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            limit,
            q: q.into(),
        }
    }
}

/// A single, non-retrying datastore call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatastoreTransport: Send + Sync {
    /// Run one search and return its records
    async fn search(&self, query: &DatastoreQuery) -> Result<Vec<Record>, FetchFault>;
}
