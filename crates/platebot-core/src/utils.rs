//! Small shared helpers.

use crate::config::{TRANSPORT_INITIAL_BACKOFF_MS, TRANSPORT_MAX_BACKOFF_MS, TRANSPORT_MAX_RETRIES};
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Truncate `s` to at most `max_chars` characters without splitting one.
///
/// ```
/// use platebot_core::utils::truncate_str;
/// assert_eq!(truncate_str("שלום עולם", 4), "שלום");
/// assert_eq!(truncate_str("short", 50), "short");
/// ```
#[must_use]
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a messaging-platform call with exponential backoff and jitter.
///
/// Starts at 500ms, caps each delay at 4s and gives up after three retries,
/// returning the last error.
///
/// # Errors
///
/// Returns the operation's last error once all attempts fail.
///
/// # Examples
///
/// ```no_run
/// use platebot_core::utils::retry_transport_operation;
///
/// # async fn example() -> anyhow::Result<()> {
/// let _sent = retry_transport_operation(|| async { Ok::<_, anyhow::Error>(1) }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_transport_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TRANSPORT_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TRANSPORT_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TRANSPORT_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            max_retries = TRANSPORT_MAX_RETRIES,
            error = %e,
            "Transport operation failed after retries"
        );
        e
    })
}
