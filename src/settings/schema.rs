//! Settings file schema.

use crate::circuit_breaker::{CircuitBreakerConfig, ConfigOverride, ServiceProfile};
use crate::core::{ConfigError, ConfigResult};
use crate::registry::CircuitBreakerRegistry;

use serde::Deserialize;
use std::collections::BTreeMap;

/// Registry-wide circuit breaker settings.
///
/// ```toml
/// [defaults]
/// failure_threshold = 5
/// recovery_timeout_ms = 30000
///
/// [services.payments]
/// profile = "external_api"
/// failure_threshold = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    /// Overrides applied on top of the built-in defaults for every service.
    pub defaults: ConfigOverride,
    /// Per-service sections, keyed by service name.
    pub services: BTreeMap<String, ServiceSettings>,
}

/// One `[services.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "toml::Table")]
pub struct ServiceSettings {
    /// Preset applied before the explicit overrides.
    pub profile: Option<ServiceProfile>,
    /// Explicit field overrides.
    pub overrides: ConfigOverride,
}

impl TryFrom<toml::Table> for ServiceSettings {
    type Error = ConfigError;

    fn try_from(mut table: toml::Table) -> Result<Self, Self::Error> {
        let profile = match table.remove("profile") {
            None => None,
            Some(toml::Value::String(name)) => Some(name.parse()?),
            Some(other) => {
                return Err(ConfigError::invalid(
                    "profile",
                    format!("expected a string, found {}", other.type_str()),
                ))
            }
        };
        let overrides: ConfigOverride = toml::Value::Table(table).try_into()?;

        Ok(Self { profile, overrides })
    }
}

impl ServiceSettings {
    /// Resolves this section against `defaults`.
    pub fn resolve(&self, defaults: &CircuitBreakerConfig) -> CircuitBreakerConfig {
        let base = match self.profile {
            Some(profile) => defaults.clone().with_profile(profile),
            None => defaults.clone(),
        };
        self.overrides.apply_to(&base)
    }
}

impl RegistrySettings {
    /// Returns the configuration every unlisted service starts from.
    pub fn default_config(&self) -> CircuitBreakerConfig {
        self.defaults.apply_to(&CircuitBreakerConfig::default())
    }

    /// Returns the resolved configuration for `service_name`.
    ///
    /// Services without a section get [`default_config`](Self::default_config).
    pub fn service_config(&self, service_name: &str) -> CircuitBreakerConfig {
        let defaults = self.default_config();
        match self.services.get(service_name) {
            Some(section) => section.resolve(&defaults),
            None => defaults,
        }
    }

    /// Checks the defaults and every service section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.default_config().validate()?;
        for name in self.services.keys() {
            self.service_config(name)
                .validate()
                .map_err(|e| e.for_service(name.as_str()))?;
        }
        Ok(())
    }

    /// Builds a registry with every configured service pre-registered.
    pub fn into_registry(self) -> ConfigResult<CircuitBreakerRegistry> {
        let registry = CircuitBreakerRegistry::new(self.default_config());
        for name in self.services.keys() {
            registry
                .register(name, self.service_config(name))
                .map_err(|e| e.for_service(name.as_str()))?;
        }

        tracing::info!(
            services = registry.len(),
            "Circuit breaker registry built from settings"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_settings_use_builtin_defaults() {
        let settings = RegistrySettings::default();
        assert_eq!(settings.default_config(), CircuitBreakerConfig::default());
        assert_eq!(settings.service_config("anything"), CircuitBreakerConfig::default());
    }

    #[test]
    fn test_profile_then_overrides() {
        let settings: RegistrySettings = toml::from_str(
            r#"
            [defaults]
            minimum_throughput = 4

            [services.payments]
            profile = "external_api"
            failure_threshold = 2
            "#,
        )
        .unwrap();

        let config = settings.service_config("payments");
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.minimum_throughput, 4);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let parsed = toml::from_str::<RegistrySettings>(
            r#"
            [services.queue]
            profile = "message_bus"
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed = toml::from_str::<RegistrySettings>(
            r#"
            [services.cache]
            failure_treshold = 3
            "#,
        );
        assert!(parsed.is_err());

        let top_level = toml::from_str::<RegistrySettings>("retries = 3");
        assert!(top_level.is_err());
    }

    #[test]
    fn test_validate_names_service() {
        let settings: RegistrySettings = toml::from_str(
            r#"
            [services.cache]
            error_rate_threshold = 2.0
            "#,
        )
        .unwrap();

        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Service { ref service, .. } if service == "cache"));
    }

    #[test]
    fn test_into_registry_preregisters() {
        let settings: RegistrySettings = toml::from_str(
            r#"
            [defaults]
            failure_threshold = 4

            [services.players-db]
            profile = "database"

            [services.sessions]
            profile = "cache"
            retry_delay_ms = 100
            "#,
        )
        .unwrap();

        let registry = settings.into_registry().unwrap();
        assert_eq!(registry.service_names(), vec!["players-db", "sessions"]);
        assert_eq!(registry.default_config().failure_threshold, 4);

        let sessions = registry.get("sessions").unwrap();
        assert_eq!(sessions.config().failure_threshold, 10);
        assert_eq!(sessions.config().retry_delay, Duration::from_millis(100));

        let db = registry.get("players-db").unwrap();
        assert!((db.config().error_rate_threshold - 0.3).abs() < f64::EPSILON);
    }
}
