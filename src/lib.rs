//! # Servicebreaker
//!
//! Per-service circuit breakers for async Rust, with retries, fallbacks,
//! timeouts and health reporting.
//!
//! ## Overview
//!
//! Servicebreaker wraps calls to external dependencies (databases, HTTP
//! APIs, caches) so that a failing dependency is isolated instead of
//! dragging its callers down with it. It lets you:
//!
//! - Run operations with per-attempt timeouts and exponential-backoff retries
//! - Stop calling a failing service and probe it for recovery
//! - Serve a fallback while a circuit is open or the primary has failed
//! - Share one breaker per service name through a registry
//! - Report per-service and system-wide health
//! - Emit structured audit events for every state change
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use servicebreaker::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let shared = SharedRegistry::new(CircuitBreakerConfig::default());
//!     let registry = shared.get();
//!
//!     let op = ServiceOperation::new("load-player", || async { db.load(42).await })
//!         .with_fallback(|| async { Ok(Player::anonymous()) })
//!         .retryable(true);
//!
//!     let result = registry.execute("players-db", &op, None).await;
//!     if result.from_fallback {
//!         println!("served from fallback");
//!     }
//!
//!     println!("{:?}", registry.system_health());
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: Operation descriptors, results and error types
//! - **Circuit Breaker**: The per-service state machine and its health monitor
//! - **Registry**: Named breakers and aggregated health
//! - **Settings**: TOML configuration for a whole registry
//! - **Audit**: Structured events for state transitions, rejections and fallbacks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod circuit_breaker;
pub mod core;
pub mod registry;
pub mod settings;

// Re-export commonly used types at the crate root
pub use crate::core::{
    BreakerError, ConfigError, ConfigResult, OperationResult, ServiceOperation,
};

pub use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ConfigOverride, HealthMetrics,
    ServiceProfile,
};
pub use crate::registry::{
    execute_service_operation, CircuitBreakerRegistry, SharedRegistry, SystemHealth,
};
pub use crate::settings::RegistrySettings;

/// Prelude module for convenient imports.
///
/// ```rust
/// use servicebreaker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{BreakerError, OperationResult, ServiceOperation};
    pub use crate::circuit_breaker::{
        CircuitBreaker, CircuitBreakerConfig, CircuitState, ConfigOverride, HealthMetrics,
        ServiceProfile,
    };
    pub use crate::registry::{CircuitBreakerRegistry, SharedRegistry, SystemHealth};
    pub use crate::settings::RegistrySettings;
}
