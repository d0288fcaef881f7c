//! Bounded exponential backoff around transcription calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::transcription::TranscriptionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per segment, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry. Doubles on each further retry.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Whether rate-limit rejections share the transient retry budget.
    pub retry_rate_limited: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_rate_limited: config.retry_rate_limited,
        }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retry_rate_limited: false,
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let multiplier = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Quota and fatal errors are never retried.
    pub fn is_retryable(&self, error: &TranscriptionError) -> bool {
        match error {
            TranscriptionError::Transient(_) => true,
            TranscriptionError::RateLimited(_) => self.retry_rate_limited,
            TranscriptionError::QuotaExceeded(_) | TranscriptionError::Fatal(_) => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent. The closure receives the 0-indexed attempt.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, TranscriptionError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, TranscriptionError>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !policy.is_retryable(&err) || attempt + 1 >= policy.max_attempts {
            return Err(err);
        }

        let delay = policy.delay_for_retry(attempt);
        warn!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            kind = err.kind(),
            error = %err,
            "Retrying transcription call"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
