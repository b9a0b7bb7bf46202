//! Read-only health snapshots.

use crate::circuit_breaker::state::{CircuitState, RequestCounters};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A point-in-time view of one breaker's health.
///
/// Produced by [`CircuitBreaker::health_metrics`]; computing it never
/// changes breaker state.
///
/// [`CircuitBreaker::health_metrics`]: crate::circuit_breaker::CircuitBreaker::health_metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Name of the protected service.
    pub service_name: String,

    /// Every call to `execute`, admitted or not.
    pub total_requests: u64,

    /// Executions whose primary work succeeded.
    pub successful_requests: u64,

    /// Executions whose primary work failed after all attempts.
    pub failed_requests: u64,

    /// Calls refused because the circuit was open.
    pub rejected_requests: u64,

    /// Number of times the circuit has opened.
    pub times_opened: u64,

    /// Failed over total requests, as a percentage rounded to 2 decimals.
    pub error_rate: f64,

    /// Mean recent response time, rounded to whole milliseconds.
    #[serde(with = "duration_serde")]
    pub average_response_time: Duration,

    /// Last successful execution (or construction/reset/recovery time).
    pub last_success_time: DateTime<Utc>,

    /// Last failure, if any has been recorded.
    pub last_failure_time: Option<DateTime<Utc>>,

    /// Current state of the circuit.
    pub circuit_state: CircuitState,

    /// Failures since the last success.
    pub consecutive_failures: u32,

    /// Time since construction or the last reset.
    #[serde(with = "duration_serde")]
    pub uptime: Duration,

    /// Whether the service is considered healthy.
    pub is_healthy: bool,
}

impl HealthMetrics {
    /// Returns the counters this snapshot was built from.
    pub fn counters(&self) -> RequestCounters {
        RequestCounters {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            rejected_requests: self.rejected_requests,
            times_opened: self.times_opened,
        }
    }
}

/// Expresses a 0.0 to 1.0 rate as a percentage with two decimals.
pub(crate) fn rate_as_percentage(rate: f64) -> f64 {
    (rate * 10_000.0).round() / 100.0
}

/// Rounds a duration to whole milliseconds.
pub(crate) fn round_to_millis(duration: Duration) -> Duration {
    let millis = (duration.as_nanos() + 500_000) / 1_000_000;
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
