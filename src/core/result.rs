//! The structured outcome of a protected operation.

use crate::circuit_breaker::CircuitState;
use crate::core::error::BreakerError;

use std::time::Duration;

/// The outcome of [`CircuitBreaker::execute`](crate::circuit_breaker::CircuitBreaker::execute).
///
/// Callers inspect this value instead of catching errors: `outcome` holds
/// either the value produced by the primary or fallback work, or the error
/// that should be reported.
#[derive(Debug, Clone)]
pub struct OperationResult<T, E> {
    /// The value or the reported error.
    pub outcome: Result<T, BreakerError<E>>,

    /// Wall time spent inside `execute`, retries and fallback included.
    pub execution_time: Duration,

    /// Index of the last primary attempt that ran (0 for the first attempt).
    pub retry_count: u32,

    /// Whether the value (or error) came from the fallback.
    pub from_fallback: bool,

    /// State of the circuit when the result was produced.
    pub circuit_state: CircuitState,
}

impl<T, E> OperationResult<T, E> {
    /// Returns `true` if a value was produced.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the produced value, if any.
    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// Returns the reported error, if any.
    pub fn error(&self) -> Option<&BreakerError<E>> {
        self.outcome.as_ref().err()
    }

    /// Converts into a plain `Result`, discarding the bookkeeping.
    pub fn into_result(self) -> Result<T, BreakerError<E>> {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_accessors() {
        let result: OperationResult<u32, String> = OperationResult {
            outcome: Ok(3),
            execution_time: Duration::from_millis(4),
            retry_count: 0,
            from_fallback: false,
            circuit_state: CircuitState::Closed,
        };
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&3));
        assert!(result.error().is_none());
        assert_eq!(result.into_result().ok(), Some(3));
    }

    #[test]
    fn test_failure_accessors() {
        let result: OperationResult<u32, String> = OperationResult {
            outcome: Err(BreakerError::unavailable("svc", CircuitState::Open)),
            execution_time: Duration::ZERO,
            retry_count: 0,
            from_fallback: false,
            circuit_state: CircuitState::Open,
        };
        assert!(!result.is_success());
        assert!(result.data().is_none());
        assert!(result.error().is_some_and(BreakerError::is_unavailable));
    }
}
