//! Utility functions shared by the services and transports.

use crate::config::{
    TRANSPORT_INITIAL_BACKOFF_MS, TRANSPORT_MAX_BACKOFF_MS, TRANSPORT_MAX_RETRIES,
};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Retry a transport operation with exponential backoff.
///
/// Meant for chat-platform calls that may fail on transient network errors.
/// Backoff starts at 500ms, is capped at 4s, carries jitter, and gives up
/// after 3 retries, returning the last error.
///
/// # Examples
///
/// ```no_run
/// use oxide_lingo_core::utils::retry_transport_operation;
///
/// # async fn example() -> anyhow::Result<()> {
/// let value = retry_transport_operation(|| async { Ok::<_, anyhow::Error>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_transport_operation<F, Fut, T, E>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let retry_strategy = ExponentialBackoff::from_millis(TRANSPORT_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TRANSPORT_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TRANSPORT_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!("Transport operation failed after {TRANSPORT_MAX_RETRIES} retries: {e}");
        e
    })
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use oxide_lingo_core::utils::truncate_str;
/// assert_eq!(truncate_str("Привіт, світ!", 6), "Привіт");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}
