//! Circuit breaker configuration.

use crate::core::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is admitted.
    pub recovery_timeout: Duration,

    /// Trailing window over which the error rate is evaluated.
    pub monitoring_window: Duration,

    /// Samples required in the window before the error rate can trip the circuit.
    pub minimum_throughput: u32,

    /// Error rate within the window (0.0 to 1.0) that opens the circuit.
    pub error_rate_threshold: f64,

    /// Period of the background health monitor.
    pub health_check_interval: Duration,

    /// Retry attempts per execution, for retryable operations.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    pub retry_delay: Duration,

    /// Whether to run the background health monitor.
    pub enable_background_monitor: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            monitoring_window: Duration::from_secs(60),
            minimum_throughput: 10,
            error_rate_threshold: 0.5,
            health_check_interval: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            enable_background_monitor: false,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the recovery timeout.
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets the monitoring window.
    pub fn with_monitoring_window(mut self, window: Duration) -> Self {
        self.monitoring_window = window;
        self
    }

    /// Sets the minimum throughput.
    pub fn with_minimum_throughput(mut self, throughput: u32) -> Self {
        self.minimum_throughput = throughput;
        self
    }

    /// Sets the error rate threshold.
    pub fn with_error_rate_threshold(mut self, threshold: f64) -> Self {
        self.error_rate_threshold = threshold;
        self
    }

    /// Sets the health check interval.
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enables or disables the background health monitor.
    pub fn with_background_monitor(mut self, enabled: bool) -> Self {
        self.enable_background_monitor = enabled;
        self
    }

    /// Applies a profile's overrides on top of this configuration.
    pub fn with_profile(self, profile: ServiceProfile) -> Self {
        profile.overrides().apply_to(&self)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "failure_threshold",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            return Err(ConfigError::invalid(
                "error_rate_threshold",
                format!("{} is not within [0, 1]", self.error_rate_threshold),
            ));
        }
        if self.enable_background_monitor && self.health_check_interval.is_zero() {
            return Err(ConfigError::invalid(
                "health_check_interval",
                "must be non-zero when the background monitor is enabled",
            ));
        }
        Ok(())
    }
}

/// A partial configuration; every `Some` field replaces the base value.
///
/// Durations are read from and written to settings files as whole
/// milliseconds under `*_ms` keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverride {
    /// Overrides `failure_threshold`.
    pub failure_threshold: Option<u32>,
    /// Overrides `recovery_timeout`.
    #[serde(rename = "recovery_timeout_ms", with = "optional_millis")]
    pub recovery_timeout: Option<Duration>,
    /// Overrides `monitoring_window`.
    #[serde(rename = "monitoring_window_ms", with = "optional_millis")]
    pub monitoring_window: Option<Duration>,
    /// Overrides `minimum_throughput`.
    pub minimum_throughput: Option<u32>,
    /// Overrides `error_rate_threshold`.
    pub error_rate_threshold: Option<f64>,
    /// Overrides `health_check_interval`.
    #[serde(rename = "health_check_interval_ms", with = "optional_millis")]
    pub health_check_interval: Option<Duration>,
    /// Overrides `max_retries`.
    pub max_retries: Option<u32>,
    /// Overrides `retry_delay`.
    #[serde(rename = "retry_delay_ms", with = "optional_millis")]
    pub retry_delay: Option<Duration>,
    /// Overrides `enable_background_monitor`.
    pub enable_background_monitor: Option<bool>,
}

impl ConfigOverride {
    /// Creates an empty override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `base` with every set field replaced.
    pub fn apply_to(&self, base: &CircuitBreakerConfig) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            recovery_timeout: self.recovery_timeout.unwrap_or(base.recovery_timeout),
            monitoring_window: self.monitoring_window.unwrap_or(base.monitoring_window),
            minimum_throughput: self.minimum_throughput.unwrap_or(base.minimum_throughput),
            error_rate_threshold: self
                .error_rate_threshold
                .unwrap_or(base.error_rate_threshold),
            health_check_interval: self
                .health_check_interval
                .unwrap_or(base.health_check_interval),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_delay: self.retry_delay.unwrap_or(base.retry_delay),
            enable_background_monitor: self
                .enable_background_monitor
                .unwrap_or(base.enable_background_monitor),
        }
    }

    /// Sets the failure threshold.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Sets the recovery timeout.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }

    /// Sets the monitoring window.
    pub fn monitoring_window(mut self, window: Duration) -> Self {
        self.monitoring_window = Some(window);
        self
    }

    /// Sets the minimum throughput.
    pub fn minimum_throughput(mut self, throughput: u32) -> Self {
        self.minimum_throughput = Some(throughput);
        self
    }

    /// Sets the error rate threshold.
    pub fn error_rate_threshold(mut self, threshold: f64) -> Self {
        self.error_rate_threshold = Some(threshold);
        self
    }

    /// Sets the health check interval.
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = Some(interval);
        self
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the base retry delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Enables or disables the background health monitor.
    pub fn background_monitor(mut self, enabled: bool) -> Self {
        self.enable_background_monitor = Some(enabled);
        self
    }
}

/// `Option<Duration>` as optional whole milliseconds.
///
/// Non-zero sub-millisecond values are written as 1 so they never become zero.
mod optional_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value
            .map(|d| u64::try_from(d.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Preset tunings for common kinds of dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceProfile {
    /// A relational database: tolerant threshold, strict error rate.
    Database,
    /// A third-party HTTP API: trips quickly, recovers slowly.
    ExternalApi,
    /// A cache: trips late, recovers quickly, retried once.
    Cache,
}

impl ServiceProfile {
    /// Returns the fields this profile sets.
    pub fn overrides(&self) -> ConfigOverride {
        let base = ConfigOverride::new();
        match self {
            Self::Database => base
                .failure_threshold(5)
                .recovery_timeout(Duration::from_secs(30))
                .error_rate_threshold(0.3)
                .max_retries(3)
                .retry_delay(Duration::from_secs(1)),
            Self::ExternalApi => base
                .failure_threshold(3)
                .recovery_timeout(Duration::from_secs(60))
                .error_rate_threshold(0.5)
                .max_retries(2)
                .retry_delay(Duration::from_secs(2)),
            Self::Cache => base
                .failure_threshold(10)
                .recovery_timeout(Duration::from_secs(15))
                .error_rate_threshold(0.7)
                .max_retries(1)
                .retry_delay(Duration::from_millis(500)),
        }
    }

    /// Returns the profile's name as used in settings files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::ExternalApi => "external_api",
            Self::Cache => "cache",
        }
    }
}

impl FromStr for ServiceProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database" => Ok(Self::Database),
            "external_api" => Ok(Self::ExternalApi),
            "cache" => Ok(Self::Cache),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}
