//! Bounded retry around a datastore transport.

use super::classify::{classify, ErrorClassification, ErrorKind};
use super::{DatastoreQuery, DatastoreTransport, FetchFault, Record};
use crate::config::PipelineSettings;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// A failed fetch together with its classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{fault} (after {attempts} attempt(s))")]
pub struct FetchError {
    /// Last fault observed
    #[source]
    pub fault: FetchFault,
    /// Classification of `fault`
    pub classification: ErrorClassification,
    /// Upstream calls made
    pub attempts: u32,
    /// `true` when a retryable fault persisted through every attempt
    pub retries_exhausted: bool,
}

impl FetchError {
    /// Kind the caller should act on.
    ///
    /// A malformed envelope is retried like a transient fault, but once the
    /// attempt budget is spent it is reported as a permanent upstream failure.
    #[must_use]
    pub fn settled_kind(&self) -> ErrorKind {
        if self.retries_exhausted && matches!(self.fault, FetchFault::InvalidResponse(_)) {
            ErrorKind::PermanentUpstream
        } else {
            self.classification.kind
        }
    }
}

/// Performs datastore calls with linear backoff between attempts.
///
/// Attempt `n` failing with a retryable fault waits `base_delay * n` before
/// attempt `n + 1`. Non-retryable faults propagate immediately.
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn DatastoreTransport>,
    max_attempts: u32,
    base_delay: Duration,
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl ResilientFetcher {
    /// Wrap `transport`. `max_attempts` below one is treated as one.
    #[must_use]
    pub fn new(transport: Arc<dyn DatastoreTransport>, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wrap `transport` using the retry settings
    #[must_use]
    pub fn from_settings(transport: Arc<dyn DatastoreTransport>, settings: &PipelineSettings) -> Self {
        Self::new(
            transport,
            settings.api_retry_attempts,
            settings.api_retry_base_delay(),
        )
    }

    /// Total attempts per fetch
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `query`, retrying retryable faults.
    ///
    /// # Errors
    ///
    /// Returns a classified [`FetchError`] when a non-retryable fault occurs
    /// or the attempt budget is exhausted. An empty query is rejected without
    /// calling the transport.
    pub async fn fetch(&self, query: &DatastoreQuery) -> Result<Vec<Record>, FetchError> {
        if query.q.trim().is_empty() {
            let fault = FetchFault::InvalidInput("empty query".to_string());
            return Err(FetchError {
                classification: classify(&fault),
                fault,
                attempts: 0,
                retries_exhausted: false,
            });
        }

        let mut attempt = 1;
        loop {
            let start = Instant::now();
            let result = self.transport.search(query).await;
            let duration = start.elapsed();

            let fault = match result {
                Ok(records) => {
                    if attempt > 1 {
                        info!(
                            resource = %query.resource_id,
                            attempt,
                            duration_ms = duration.as_millis(),
                            "Datastore retry succeeded"
                        );
                    }
                    return Ok(records);
                }
                Err(fault) => fault,
            };

            let classification = classify(&fault);
            warn!(
                resource = %query.resource_id,
                attempt,
                max_attempts = self.max_attempts,
                duration_ms = duration.as_millis(),
                kind = classification.kind.as_str(),
                error = %fault,
                "Datastore request failed"
            );

            if classification.retryable && attempt < self.max_attempts {
                let backoff = self.base_delay.saturating_mul(attempt);
                info!(
                    resource = %query.resource_id,
                    backoff_ms = backoff.as_millis(),
                    attempt,
                    max_attempts = self.max_attempts,
                    "Retrying datastore request"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            return Err(FetchError {
                retries_exhausted: classification.retryable,
                classification,
                fault,
                attempts: attempt,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::MockDatastoreTransport;
    use super::*;
    use mockall::Sequence;

    fn query() -> DatastoreQuery {
        DatastoreQuery::new("resource", 10, "12345678")
    }

    fn record() -> Record {
        let mut r = Record::new();
        r.insert("mispar_rechev".into(), 12_345_678.into());
        r
    }

    fn fetcher(mock: MockDatastoreTransport, attempts: u32) -> ResilientFetcher {
        ResilientFetcher::new(Arc::new(mock), attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_5xx_then_succeeds() {
        let mut mock = MockDatastoreTransport::new();
        let mut seq = Sequence::new();
        mock.expect_search()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(FetchFault::Status(503)));
        mock.expect_search()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![record()]));

        let records = fetcher(mock, 3).fetch(&query()).await.expect("third attempt succeeds");
        assert_eq!(records, vec![record()]);
    }

    #[tokio::test]
    async fn test_4xx_is_not_retried() {
        let mut mock = MockDatastoreTransport::new();
        mock.expect_search()
            .times(1)
            .returning(|_| Err(FetchFault::Status(400)));

        let err = fetcher(mock, 3).fetch(&query()).await.expect_err("400 fails");
        assert_eq!(err.attempts, 1);
        assert!(!err.retries_exhausted);
        assert_eq!(err.classification.kind, ErrorKind::PermanentUpstream);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_fault() {
        let mut mock = MockDatastoreTransport::new();
        mock.expect_search()
            .times(3)
            .returning(|_| Err(FetchFault::Timeout));

        let err = fetcher(mock, 3).fetch(&query()).await.expect_err("always times out");
        assert_eq!(err.fault, FetchFault::Timeout);
        assert_eq!(err.attempts, 3);
        assert!(err.retries_exhausted);
        assert_eq!(err.settled_kind(), ErrorKind::TransientNetwork);
    }

    #[tokio::test]
    async fn test_invalid_response_is_retried_then_permanent() {
        let mut mock = MockDatastoreTransport::new();
        mock.expect_search()
            .times(2)
            .returning(|_| Err(FetchFault::InvalidResponse("success=false".into())));

        let err = fetcher(mock, 2).fetch(&query()).await.expect_err("never valid");
        assert_eq!(err.attempts, 2);
        assert_eq!(err.classification.kind, ErrorKind::TransientUpstream);
        assert_eq!(err.settled_kind(), ErrorKind::PermanentUpstream);
    }

    #[tokio::test]
    async fn test_empty_query_short_circuits() {
        let mut mock = MockDatastoreTransport::new();
        mock.expect_search().never();

        let err = fetcher(mock, 3)
            .fetch(&DatastoreQuery::new("resource", 10, "  "))
            .await
            .expect_err("empty query rejected");
        assert_eq!(err.attempts, 0);
        assert_eq!(err.classification.kind, ErrorKind::PermanentInput);
    }

    #[tokio::test]
    async fn test_backoff_is_linear() {
        let mut mock = MockDatastoreTransport::new();
        mock.expect_search()
            .times(3)
            .returning(|_| Err(FetchFault::Status(500)));

        let fetcher = ResilientFetcher::new(Arc::new(mock), 3, Duration::from_millis(20));
        let start = Instant::now();
        let _ = fetcher.fetch(&query()).await;
        // 20ms after attempt 1, 40ms after attempt 2
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
