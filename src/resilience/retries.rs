//! Retry policy.
//!
//! # Design Decisions
//! - Timeouts and connection errors are retryable
//! - Protocol errors are not: the endpoint answered, the answer was wrong
//! - `max_attempts` counts the first attempt, so 1 disables retries

use std::time::Duration;

use crate::config::RetryConfig;
use crate::dispatch::TransportError;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before the next attempt, or `None` when the unit should fail now.
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn next_delay(&self, attempt: u32, error: &TransportError) -> Option<Duration> {
        if attempt >= self.max_attempts || !is_retryable(error) {
            return None;
        }
        Some(calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Whether a failed attempt may be retried.
pub fn is_retryable(error: &TransportError) -> bool {
    matches!(error, TransportError::Timeout(_) | TransportError::Network(_))
}
