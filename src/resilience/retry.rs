//! Retry configuration, backoff calculation and the [`BackoffRetrier`].
//!
//! The retrier re-runs a unit of work while it fails with a transient error
//! (as classified by [`HuginnError::is_transient()`](crate::HuginnError::is_transient)),
//! sleeping with exponential backoff plus jitter between attempts. Permanent
//! errors and the final error after the budget is spent are returned exactly
//! as the operation produced them.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Result;
use crate::telemetry;

/// Configuration for retry behaviour on transient errors.
///
/// The delay before retry `n` (1-based) is
/// `min(max_delay, base_delay * 2^n + U(0, jitter_factor * base_delay * 2^n))`.
///
/// ```rust
/// # use huginn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(5)
///     .base_delay(Duration::from_millis(200))
///     .jitter_factor(0.1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt. 0 = no retry. Default: 3.
    pub max_retries: u32,
    /// Backoff base. Default: 1s.
    pub base_delay: Duration,
    /// Cap on any single delay. Default: 10s.
    pub max_delay: Duration,
    /// Upper bound of the random jitter as a fraction of the exponential
    /// delay, in `[0, 1]`. Default: 0.25.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Create a new config with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries after the first attempt.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the backoff base.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter fraction. Values outside `[0, 1]` are clamped.
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Exponential delay for retry `n` without jitter: `base_delay * 2^n`,
    /// capped at `max_delay`.
    pub fn delay_for_retry(&self, n: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(n))
            .min(self.max_delay)
    }

    /// Full delay for retry `n` given a jitter sample in `[0, 1)`.
    ///
    /// Deterministic so callers and tests can reason about the envelope;
    /// [`effective_delay()`](Self::effective_delay) draws the sample.
    pub fn backoff_delay(&self, n: u32, sample: f64) -> Duration {
        let exponential = self.base_delay.saturating_mul(2u32.saturating_pow(n));
        if exponential >= self.max_delay {
            return self.max_delay;
        }
        let fraction = (sample.clamp(0.0, 1.0) * self.jitter_factor).max(0.0);
        let jitter = exponential.mul_f64(fraction);
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    /// Delay for retry `n` with a fresh random jitter sample.
    pub fn effective_delay(&self, n: u32) -> Duration {
        self.backoff_delay(n, rand::random::<f64>())
    }
}

/// Executes a unit of work with bounded exponential-backoff retries.
///
/// Holds only immutable configuration: each [`execute()`](Self::execute) call
/// keeps its own attempt counter, so one retrier can be shared by any number
/// of concurrent calls.
#[derive(Debug, Clone)]
pub struct BackoffRetrier {
    config: RetryConfig,
    operation: &'static str,
}

impl BackoffRetrier {
    /// Create a retrier; `operation` labels logs and metrics.
    pub fn new(config: RetryConfig, operation: &'static str) -> Self {
        Self { config, operation }
    }

    /// The retry policy in use.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `f`, retrying transient failures.
    ///
    /// Makes at most `max_retries + 1` attempts. Permanent errors are
    /// returned immediately; once the budget is spent the last error is
    /// returned unchanged.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.config.effective_delay(retries);
                    metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => self.operation)
                        .increment(1);
                    warn!(
                        operation = self.operation,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
