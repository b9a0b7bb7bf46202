//! Per-service circuit breakers.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to a failing dependency and probing it to detect
//! recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; requests pass through.
//! - **Open**: The dependency is failing; requests are refused or served by a fallback.
//! - **Half-Open**: Requests are admitted as probes; a success closes the circuit.
//!
//! ## Usage
//!
//! ```rust
//! use servicebreaker::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, ServiceProfile};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::default()
//!     .with_profile(ServiceProfile::Database)
//!     .with_recovery_timeout(Duration::from_secs(10));
//!
//! let breaker = CircuitBreaker::new("players-db", config);
//! assert!(breaker.state().is_closed());
//! ```

mod breaker;
mod config;
mod metrics;
mod monitor;
mod retry;
mod state;

pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, ConfigOverride, ServiceProfile};
pub use metrics::HealthMetrics;
pub use retry::Backoff;
pub use state::{CircuitState, OperationHistory, OperationRecord, RequestCounters, ResponseTimes};
