//! Retry logic.
//!
//! # Responsibilities
//! - Run one source call with a per-attempt deadline
//! - Retry transient failures with exponential backoff
//! - Surface non-retryable failures unchanged after a single attempt
//!
//! # Design Decisions
//! - The retry predicate is a total function over `SourceError` kinds
//! - Backoff sleeps on the tokio timer; only the awaiting task is suspended
//! - A timeout counts as a transient failure

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::with_timeout;
use crate::sources::SourceError;

/// How a single source call is attempted.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
    /// Deadline for each individual attempt.
    pub attempt_timeout: Duration,
    /// Decides whether an error deserves another attempt.
    pub is_retryable: fn(&SourceError) -> bool,
}

impl RetryPolicy {
    /// Delay slept before retry number `retry_index` (0-based).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        calculate_backoff(
            retry_index,
            self.initial_delay,
            self.backoff_factor,
            self.max_delay,
            self.jitter_ratio,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            is_retryable: SourceError::is_retryable,
        }
    }
}

/// Execute `operation` under `policy`.
///
/// `label` names the source in logs and metrics. Returns the first success,
/// the first non-retryable error, or the last error once attempts run out.
pub async fn execute<T, F, Fut>(label: &str, policy: &RetryPolicy, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let error = match with_timeout(policy.attempt_timeout, operation()).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !(policy.is_retryable)(&error) {
            tracing::debug!(source = %label, attempt, error = %error, "Non-retryable source error");
            return Err(error);
        }

        if attempt >= max_attempts {
            tracing::warn!(source = %label, attempts = attempt, error = %error, "Retries exhausted");
            return Err(error);
        }

        let delay = policy.delay_for(attempt - 1);
        tracing::info!(source = %label, attempt, delay = ?delay, error = %error, "Retrying source call");
        metrics::record_source_retry(label);
        tokio::time::sleep(delay).await;
    }
}
