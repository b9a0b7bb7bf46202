//! Retry bookkeeping and exponential backoff.

use crate::circuit_breaker::config::CircuitBreakerConfig;

use std::time::Duration;

/// Retry behavior for one execution of a retryable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry; doubled for each later one.
    pub base_delay: Duration,
}

impl Backoff {
    /// Creates a backoff policy.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Takes the retry settings from a breaker configuration.
    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }

    /// Delay to wait after failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Returns whether another attempt may follow failed attempt `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff() {
        let backoff = Backoff::default();
        assert_eq!(backoff.max_retries, 3);
        assert_eq!(backoff.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_doubles() {
        let backoff = Backoff::new(3, Duration::from_millis(100));
        assert_eq!(backoff.delay_after(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_after(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_saturates() {
        let backoff = Backoff::new(u32::MAX, Duration::from_secs(1));
        assert_eq!(backoff.delay_after(64), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_should_retry() {
        let backoff = Backoff::new(2, Duration::from_millis(1));
        assert!(backoff.should_retry(0));
        assert!(backoff.should_retry(1));
        assert!(!backoff.should_retry(2));
    }
}
