//! Bounded retry with exponential backoff
//!
//! The wait before attempt `n` (for `n >= 2`) is
//! `clamp(multiplier * 2^(n - 2), min_wait, max_wait)` time units. With the
//! defaults (3 attempts, multiplier 1, bounds 4..10 seconds) an operation
//! that keeps failing runs three times, waiting 4s before each retry.

use crate::config::{RetryConfig, RetryTrigger};
use crate::{LanternError, Result};
use std::future::Future;
use std::time::Duration;

/// Which errors are worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    /// Only transport-level failures (timeouts, refused connections, non-2xx)
    Transient,
    /// Any error the operation returns
    AnyError,
}

impl RetryOn {
    /// Returns true if the error should trigger another attempt
    pub fn should_retry(&self, err: &LanternError) -> bool {
        match self {
            RetryOn::Transient => err.is_transient(),
            RetryOn::AnyError => true,
        }
    }
}

impl From<RetryTrigger> for RetryOn {
    fn from(trigger: RetryTrigger) -> Self {
        match trigger {
            RetryTrigger::Any => RetryOn::AnyError,
            RetryTrigger::Transient => RetryOn::Transient,
        }
    }
}

/// Retry policy applied to one kind of operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    multiplier: f64,
    min_wait: f64,
    max_wait: f64,
    unit: Duration,
    retry_on: RetryOn,
}

/// Upper bound on any single wait
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

impl RetryPolicy {
    /// Creates a policy from the `[retry]` config section
    pub fn from_config(config: &RetryConfig, retry_on: RetryOn) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            multiplier: config.multiplier,
            min_wait: config.min_wait,
            max_wait: config.max_wait,
            unit: Duration::from_millis(config.unit_ms),
            retry_on,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_on(&self) -> RetryOn {
        self.retry_on
    }

    /// Wait before the given 1-based attempt; zero for the first attempt
    ///
    /// Never exceeds [`MAX_BACKOFF`].
    pub fn wait_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(63) as i32;
        let units = (self.multiplier * 2f64.powi(exponent))
            .max(self.min_wait)
            .min(self.max_wait)
            .max(0.0);
        Duration::try_from_secs_f64(self.unit.as_secs_f64() * units)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Runs an operation until it succeeds, fails with a non-retryable
    /// error, or the attempt budget is spent
    ///
    /// # Arguments
    ///
    /// * `label` - Operation name used in log messages
    /// * `operation` - Produces a fresh future for every attempt
    ///
    /// # Returns
    ///
    /// The first success, or the last error observed.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.retry_on.should_retry(&err) {
                        return Err(err);
                    }
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            "{} failed after {} attempt(s): {}",
                            label,
                            attempt,
                            err
                        );
                        return Err(err);
                    }

                    attempt += 1;
                    let wait = self.wait_before(attempt);
                    tracing::warn!(
                        "{} failed: {}. Retrying in {:?} (attempt {}/{})",
                        label,
                        err,
                        wait,
                        attempt,
                        self.max_attempts
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
