//! Exponential backoff for transient remote failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retry.
    pub fn none() -> Self {
        RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);

        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }
}

/// Whether an error is worth another attempt: network failures, timeouts,
/// rate limiting and server errors.
pub fn is_transient(error: &Error) -> bool {
    match error {
        Error::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().is_some_and(|status| {
                    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                })
        }
        _ => false,
    }
}

/// Whether an error happened before the request reached the server. Only
/// these are safe to retry for requests that create something.
pub fn is_connect_failure(error: &Error) -> bool {
    matches!(error, Error::Http(e) if e.is_connect())
}

/// Runs `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or runs out of attempts.
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts && should_retry(&error) => {
                let delay = config.delay(attempt);
                warn!(attempt, max_attempts, error = %error, "request failed, retrying");
                debug!(?delay, "waiting before retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
