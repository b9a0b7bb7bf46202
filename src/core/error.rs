//! Error types for the servicebreaker library.
//!
//! Failures of a protected operation are never raised as panics or
//! propagated with `?` out of [`CircuitBreaker::execute`]; they are carried
//! inside the returned [`OperationResult`] as a [`BreakerError`].
//!
//! [`CircuitBreaker::execute`]: crate::circuit_breaker::CircuitBreaker::execute
//! [`OperationResult`]: crate::core::OperationResult

use crate::circuit_breaker::CircuitState;

use std::time::Duration;
use thiserror::Error;

/// The error surfaced by a protected operation.
///
/// The operation's own error type `E` is passed through unchanged; the
/// breaker only synthesizes the `Timeout` and `Unavailable` variants.
#[derive(Debug, Clone, Error)]
pub enum BreakerError<E> {
    /// The wrapped operation (or its fallback) failed with its own error.
    #[error("{0}")]
    Operation(E),

    /// An attempt did not complete within its timeout.
    #[error("operation '{operation}' on service '{service}' timed out after {timeout:?}")]
    Timeout {
        /// Name of the protected service.
        service: String,
        /// Name of the operation that timed out.
        operation: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Admission was refused because the circuit is open.
    #[error("service '{service}' is currently unavailable (circuit breaker {state})")]
    Unavailable {
        /// Name of the protected service.
        service: String,
        /// State of the circuit when the request was refused.
        state: CircuitState,
    },
}

impl<E> BreakerError<E> {
    /// Creates a `Timeout` error.
    pub fn timeout(
        service: impl Into<String>,
        operation: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::Timeout {
            service: service.into(),
            operation: operation.into(),
            timeout,
        }
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(service: impl Into<String>, state: CircuitState) -> Self {
        Self::Unavailable {
            service: service.into(),
            state,
        }
    }

    /// Returns `true` if the attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the request was refused by an open circuit.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the operation's own error, if that is what failed.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the error and returns the operation's own error, if any.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the service name for synthesized errors.
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Timeout { service, .. } | Self::Unavailable { service, .. } => Some(service),
            Self::Operation(_) => None,
        }
    }
}

/// Error type for invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A per-service section names a profile that does not exist.
    #[error("unknown service profile '{0}'")]
    UnknownProfile(String),

    /// A per-service section is invalid.
    #[error("service '{service}': {source}")]
    Service {
        /// The service whose section was rejected.
        service: String,
        /// The underlying problem.
        #[source]
        source: Box<ConfigError>,
    },

    /// The settings file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings document is not valid TOML for the expected shape.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Creates an `InvalidValue` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Attributes this error to a named service section.
    pub fn for_service(self, service: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            source: Box::new(self),
        }
    }
}

/// A specialized `Result` type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message() {
        let err: BreakerError<String> = BreakerError::unavailable("players-db", CircuitState::Open);
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("unavailable"));
        assert!(err.to_string().contains("players-db"));
        assert_eq!(err.service(), Some("players-db"));
    }

    #[test]
    fn test_operation_error_passthrough() {
        let err = BreakerError::Operation("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.operation_error().map(String::as_str), Some("boom"));
        assert_eq!(err.service(), None);
        assert_eq!(err.into_operation_error(), Some("boom".to_string()));
    }

    #[test]
    fn test_timeout_error() {
        let err: BreakerError<std::io::Error> =
            BreakerError::timeout("cache", "get", Duration::from_millis(250));
        assert!(err.is_timeout());
        assert!(!err.is_unavailable());
        assert!(err.to_string().contains("timed out"));
        assert!(err.operation_error().is_none());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("error_rate_threshold", "must be within [0, 1]");
        assert!(err.to_string().contains("error_rate_threshold"));
    }
}
