//! Bounded retry with exponential, capped backoff.

use std::thread;
use std::time::Duration;

use stowage_config::RetrySettings;
use tracing::warn;

use crate::error::{FsError, FsResult};

/// Retry schedule applied to every filesystem call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    limit: u32,
    initial_wait: Duration,
    max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetrySettings::default())
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self::new(settings.limit, settings.initial_wait(), settings.max_wait())
    }
}

impl RetryPolicy {
    /// Build a policy; `limit` counts total attempts and is clamped to at least one.
    #[must_use]
    pub fn new(limit: u32, initial_wait: Duration, max_wait: Duration) -> Self {
        Self {
            limit: limit.max(1),
            initial_wait,
            max_wait,
        }
    }

    /// Policy that retries without sleeping.
    #[must_use]
    pub fn immediate(limit: u32) -> Self {
        Self::new(limit, Duration::ZERO, Duration::ZERO)
    }

    /// Total attempts per call, including the first.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Wait before retry number `retry_count` (1-based).
    #[must_use]
    pub fn wait_before_retry(&self, retry_count: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry_count.saturating_sub(1));
        self.initial_wait.saturating_mul(factor).min(self.max_wait)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the attempt
    /// limit is reached. `on_retry` observes each failure that triggers another attempt.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `call`, unchanged.
    pub fn run<T, F, R>(&self, operation: &'static str, mut call: F, mut on_retry: R) -> FsResult<T>
    where
        F: FnMut() -> FsResult<T>,
        R: FnMut(&FsError, u32),
    {
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() || attempt >= self.limit => return Err(err),
                Err(err) => {
                    let wait = self.wait_before_retry(attempt);
                    warn!(
                        operation,
                        error = %err.detail(),
                        retry_count = attempt,
                        retry_limit = self.limit,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "filesystem call failed; retrying"
                    );
                    on_retry(&err, attempt);
                    thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}
