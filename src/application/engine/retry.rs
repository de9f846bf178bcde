//! Bounded retry for job-mutating runtime calls.
//!
//! Read timeouts against the jobs API are common enough during cluster
//! hiccups to be worth retrying; anything else propagates immediately because
//! the operations are not guaranteed idempotent under other failures.

use std::future::Future;
use std::time::Duration;

use crate::ports::RuntimeError;

/// Maximum attempts per call site.
pub const MAX_ATTEMPTS: u32 = 5;

/// Delay before the second attempt; doubles after every attempt.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Run `operation`, retrying read-timeout failures with exponential backoff.
pub async fn retry_on_timeout<T, F, Fut>(mut operation: F) -> Result<T, RuntimeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RuntimeError>>,
{
    let mut delay = INITIAL_DELAY;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(%error, attempt, "Retrying timed-out runtime call");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
