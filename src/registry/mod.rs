//! Named circuit breakers shared across an application.
//!
//! [`CircuitBreakerRegistry`] maps service names to breakers and reports
//! aggregated health. [`SharedRegistry`] is the handle passed around from
//! the composition root so that every component resolves the same registry.

#[allow(clippy::module_inception)]
mod registry;
mod shared;

pub use registry::{CircuitBreakerRegistry, SystemHealth};
pub use shared::SharedRegistry;

use crate::circuit_breaker::ConfigOverride;
use crate::core::{OperationResult, ServiceOperation};
use std::fmt;

/// Runs `operation` for `service_name` through the shared registry.
///
/// Shorthand for `shared.get().execute(..)`.
pub async fn execute_service_operation<T, E>(
    shared: &SharedRegistry,
    service_name: &str,
    operation: &ServiceOperation<'_, T, E>,
    config_override: Option<&ConfigOverride>,
) -> OperationResult<T, E>
where
    E: fmt::Display,
{
    shared
        .get()
        .execute(service_name, operation, config_override)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_service_operation() {
        let shared = SharedRegistry::default();
        let op = ServiceOperation::new("ping", || async { Ok::<_, String>("pong") });

        let result = execute_service_operation(&shared, "echo", &op, None).await;

        assert_eq!(result.data(), Some(&"pong"));
        assert_eq!(shared.get().get("echo").map(|b| b.health_metrics().total_requests), Some(1));
    }
}
