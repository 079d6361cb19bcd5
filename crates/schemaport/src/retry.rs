//! Retry logic with exponential backoff for calls against the target
//! Data API.
//!
//! Only rate limits and transient server-side failures are retried.
//! Timeouts and connection failures are deliberately not: the
//! materializer must record those per collection (or abort the database)
//! and move on, so they surface immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Config with no retries (for tests or when retries are unwanted).
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Calculates the delay for a given attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);

        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.add_jitter {
            // Up to 25% jitter.
            capped_delay + capped_delay * 0.25 * rand_jitter()
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without external dependencies.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Determines if an error is worth retrying.
pub fn is_retryable_error(error: &Error) -> bool {
    if matches!(error, Error::RateLimit(_)) {
        return true;
    }

    // Timeouts and connection errors carry their own recovery semantics
    // in the materializer; retrying here would hide them.
    if matches!(error, Error::Timeout(_) | Error::Connection(_)) {
        return false;
    }

    let message = error.to_string().to_lowercase();

    let is_rate_limit = message.contains("429")
        || message.contains("rate limit")
        || message.contains("too many requests");

    let is_server_error = message.contains("500")
        || message.contains("502")
        || message.contains("503")
        || message.contains("504")
        || message.contains("internal server error")
        || message.contains("bad gateway")
        || message.contains("service unavailable");

    is_rate_limit || is_server_error
}

/// Executes an async operation with retry logic.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once all
/// retries are exhausted.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<Error> = None;
    let max_attempts = config.max_retries + 1;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            debug!(
                "{}: retry attempt {}/{} after {:?}",
                operation_name, attempt, config.max_retries, delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{}: succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if is_retryable_error(&e) && attempt < config.max_retries {
                    warn!(
                        "{}: retryable error (attempt {}/{}): {}",
                        operation_name,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                } else {
                    return Err(e);
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::Materialization("all retry attempts failed".to_string())))
}
