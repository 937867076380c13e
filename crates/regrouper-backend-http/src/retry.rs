//! Retry logic with exponential backoff for backend HTTP calls.
//!
//! Retries only on transport errors (connection failures, timeouts). HTTP
//! status codes are returned to the caller untouched; the cycle controller
//! decides what to do with them.

use std::future::Future;
use std::time::Duration;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
pub(crate) const BASE_DELAY: Duration = Duration::from_millis(200);

/// Send an HTTP request with exponential backoff retry on transport errors.
///
/// The closure `f` is called up to `max_retries + 1` times.
pub(crate) async fn retry_send<F, Fut>(
    max_retries: u32,
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = BASE_DELAY * 2u32.saturating_pow(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries,
                    error = %e,
                    "Backend request failed, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    // Final attempt, no more retries.
    f().await
}
