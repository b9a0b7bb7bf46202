//! The per-service circuit breaker registry.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, ConfigOverride, HealthMetrics};
use crate::core::{ConfigResult, OperationResult, ServiceOperation};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Aggregated health across every registered breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Number of registered services.
    pub total_services: usize,
    /// Services whose breaker reports healthy.
    pub healthy_services: usize,
    /// Services whose breaker reports unhealthy.
    pub unhealthy_services: usize,
    /// `true` when no service is unhealthy.
    pub overall_healthy: bool,
    /// Per-service snapshots, keyed by service name.
    pub services: BTreeMap<String, HealthMetrics>,
}

impl SystemHealth {
    /// Builds the aggregate from per-service snapshots.
    pub fn from_metrics(services: BTreeMap<String, HealthMetrics>) -> Self {
        let total_services = services.len();
        let healthy_services = services.values().filter(|m| m.is_healthy).count();
        let unhealthy_services = total_services - healthy_services;

        Self {
            total_services,
            healthy_services,
            unhealthy_services,
            overall_healthy: unhealthy_services == 0,
            services,
        }
    }

    /// Names of the services currently reporting unhealthy.
    pub fn unhealthy(&self) -> impl Iterator<Item = &str> {
        self.services
            .values()
            .filter(|m| !m.is_healthy)
            .map(|m| m.service_name.as_str())
    }
}

/// Owns one [`CircuitBreaker`] per service name.
///
/// Breakers are created lazily on first use and shared as
/// `Arc<CircuitBreaker>`, so unrelated components that name the same
/// service observe the same circuit.
///
/// # Example
///
/// ```rust
/// use servicebreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
///
/// let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
/// let db = registry.get_or_create("players-db", None);
/// let same = registry.get_or_create("players-db", None);
///
/// assert!(std::sync::Arc::ptr_eq(&db, &same));
/// assert_eq!(registry.system_health().total_services, 1);
/// ```
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry whose breakers start from `default_config`.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configuration applied to new breakers.
    pub fn default_config(&self) -> &CircuitBreakerConfig {
        &self.default_config
    }

    /// Returns the breaker for `service_name`, creating it if needed.
    ///
    /// A new breaker uses the default configuration with `config_override`
    /// applied on top. The override is ignored if the breaker already exists.
    pub fn get_or_create(
        &self,
        service_name: &str,
        config_override: Option<&ConfigOverride>,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(service_name) {
            return existing;
        }

        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let breaker = breakers.entry(service_name.to_string()).or_insert_with(|| {
            let config = match config_override {
                Some(overrides) => overrides.apply_to(&self.default_config),
                None => self.default_config.clone(),
            };
            Arc::new(CircuitBreaker::new(service_name, config))
        });
        Arc::clone(breaker)
    }

    /// Registers a breaker with an explicit, validated configuration.
    ///
    /// An existing breaker for the same service is kept and returned.
    pub fn register(
        &self,
        service_name: &str,
        config: CircuitBreakerConfig,
    ) -> ConfigResult<Arc<CircuitBreaker>> {
        config.validate()?;

        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let breaker = breakers
            .entry(service_name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service_name, config)));
        Ok(Arc::clone(breaker))
    }

    /// Returns the breaker for `service_name`, if one exists.
    pub fn get(&self, service_name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(service_name)
            .cloned()
    }

    /// Returns `true` if a breaker exists for `service_name`.
    pub fn contains(&self, service_name: &str) -> bool {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(service_name)
    }

    /// Returns the number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if no breaker is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the registered service names, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Runs `operation` through the breaker for `service_name`.
    pub async fn execute<T, E>(
        &self,
        service_name: &str,
        operation: &ServiceOperation<'_, T, E>,
        config_override: Option<&ConfigOverride>,
    ) -> OperationResult<T, E>
    where
        E: fmt::Display,
    {
        let breaker = self.get_or_create(service_name, config_override);
        breaker.execute(operation).await
    }

    /// Returns a health snapshot for every registered service.
    pub fn all_health_metrics(&self) -> BTreeMap<String, HealthMetrics> {
        self.snapshot()
            .into_iter()
            .map(|(name, breaker)| (name, breaker.health_metrics()))
            .collect()
    }

    /// Returns aggregated health across every registered service.
    pub fn system_health(&self) -> SystemHealth {
        SystemHealth::from_metrics(self.all_health_metrics())
    }

    /// Forces every circuit closed.
    pub fn trigger_recovery_all(&self) {
        for (_, breaker) in self.snapshot() {
            breaker.trigger_recovery();
        }
        tracing::info!(services = self.len(), "Recovery triggered for all services");
    }

    /// Resets every breaker to its initial state.
    pub fn reset_all(&self) {
        for (_, breaker) in self.snapshot() {
            breaker.reset();
        }
        tracing::info!(services = self.len(), "All circuit breakers reset");
    }

    /// Stops every monitor and empties the registry.
    pub fn destroy_all(&self) {
        let drained: Vec<Arc<CircuitBreaker>> = self
            .breakers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .map(|(_, breaker)| breaker)
            .collect();

        for breaker in &drained {
            breaker.destroy();
        }
        tracing::debug!(services = drained.len(), "All circuit breakers destroyed");
    }

    /// Clones the current entries so callers never hold the map lock.
    fn snapshot(&self) -> Vec<(String, Arc<CircuitBreaker>)> {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(name, breaker)| (name.clone(), Arc::clone(breaker)))
            .collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("services", &self.service_names())
            .field("default_config", &self.default_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitState, ServiceProfile};
    use crate::core::BreakerError;
    use std::time::Duration;

    fn failing() -> ServiceOperation<'static, (), String> {
        ServiceOperation::new("fetch", || async { Err("boom".to_string()) })
    }

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_max_retries(0),
        )
    }

    #[test]
    fn test_get_or_create_reuses_breaker() {
        let registry = registry();
        let first = registry.get_or_create("players-db", None);
        let second = registry.get_or_create("players-db", None);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("players-db"));
        assert!(registry.get("scouts-db").is_none());
    }

    #[test]
    fn test_override_wins_over_default() {
        let registry = registry();
        let overrides = ConfigOverride::new()
            .failure_threshold(7)
            .recovery_timeout(Duration::from_secs(5));
        let breaker = registry.get_or_create("api", Some(&overrides));

        assert_eq!(breaker.config().failure_threshold, 7);
        assert_eq!(breaker.config().recovery_timeout, Duration::from_secs(5));
        assert_eq!(breaker.config().max_retries, 0);

        // Existing breakers keep their configuration.
        let again = registry.get_or_create("api", Some(&ConfigOverride::new().failure_threshold(1)));
        assert_eq!(again.config().failure_threshold, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_millisecond_override_still_refuses() {
        let registry = registry();
        let overrides = ConfigOverride::new()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_micros(900));
        let breaker = registry.get_or_create("svc", Some(&overrides));
        assert_eq!(breaker.config().recovery_timeout, Duration::from_micros(900));

        registry.execute("svc", &failing(), None).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let refused = registry.execute("svc", &failing(), None).await;
        assert!(refused.error().is_some_and(BreakerError::is_unavailable));
        assert_eq!(breaker.health_metrics().rejected_requests, 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        registry.execute("svc", &failing(), None).await;
        assert_eq!(breaker.health_metrics().rejected_requests, 1);
    }

    #[test]
    fn test_register_validates() {
        let registry = registry();
        let bad = CircuitBreakerConfig::default().with_failure_threshold(0);
        assert!(registry.register("api", bad).is_err());
        assert!(registry.is_empty());

        let good = CircuitBreakerConfig::default().with_profile(ServiceProfile::Cache);
        let breaker = registry.register("cache", good).unwrap();
        assert_eq!(breaker.config().failure_threshold, 10);
    }

    #[tokio::test]
    async fn test_registry_isolation() {
        let registry = registry();
        for _ in 0..2 {
            registry.execute("a", &failing(), None).await;
        }
        let ok = ServiceOperation::new("ok", || async { Ok::<(), String>(()) });
        registry.execute("b", &ok, None).await;

        let a = registry.get("a").unwrap();
        let b = registry.get("b").unwrap();
        assert_eq!(a.state(), CircuitState::Open);
        assert_eq!(b.state(), CircuitState::Closed);

        let b_metrics = b.health_metrics();
        assert_eq!(b_metrics.total_requests, 1);
        assert_eq!(b_metrics.failed_requests, 0);
    }

    #[tokio::test]
    async fn test_system_health_aggregation() {
        let registry = registry();
        registry.get_or_create("a", None);
        for _ in 0..2 {
            registry.execute("b", &failing(), None).await;
        }

        let health = registry.system_health();
        assert_eq!(health.total_services, 2);
        assert_eq!(health.healthy_services, 1);
        assert_eq!(health.unhealthy_services, 1);
        assert!(!health.overall_healthy);
        assert_eq!(health.unhealthy().collect::<Vec<_>>(), vec!["b"]);
        assert!(health.services.contains_key("a"));
    }

    #[test]
    fn test_empty_registry_is_healthy() {
        let health = registry().system_health();
        assert_eq!(health.total_services, 0);
        assert!(health.overall_healthy);
    }

    #[tokio::test]
    async fn test_bulk_operations() {
        let registry = registry();
        for name in ["a", "b"] {
            for _ in 0..2 {
                registry.execute(name, &failing(), None).await;
            }
        }
        assert_eq!(registry.system_health().unhealthy_services, 2);

        registry.trigger_recovery_all();
        let health = registry.system_health();
        assert!(health
            .services
            .values()
            .all(|m| m.circuit_state == CircuitState::Closed && m.consecutive_failures == 0));

        registry.reset_all();
        assert!(registry
            .all_health_metrics()
            .values()
            .all(|m| m.total_requests == 0 && m.is_healthy));

        registry.destroy_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_service_names_sorted() {
        let registry = registry();
        registry.get_or_create("scouts", None);
        registry.get_or_create("players", None);
        assert_eq!(registry.service_names(), vec!["players", "scouts"]);
    }
}
