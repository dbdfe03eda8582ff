//! Retry policy for rate-limited or timed-out generation calls.

use crate::errors::GenerationError;
use std::time::Duration;

/// Exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts on the primary model, first call included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retrying after failed attempt `attempt` (1-based).
    ///
    /// A server-provided `retry_after` wins over the computed backoff; both
    /// are capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, error: &GenerationError) -> Duration {
        let delay = error.retry_after().unwrap_or_else(|| {
            let exponent = attempt.saturating_sub(1).min(16) as i32;
            let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
            Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
        });
        delay.min(self.max_delay)
    }

    /// Whether another attempt on the same model is allowed after `attempt`.
    pub fn should_retry(&self, attempt: u32, error: &GenerationError) -> bool {
        error.is_retryable() && attempt < self.max_attempts.max(1)
    }
}
