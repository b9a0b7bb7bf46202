//! Audit event types and emission functions.

use crate::circuit_breaker::{CircuitState, HealthMetrics};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Serializes the event as a single-line JSON record.
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Why a circuit changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Consecutive failures reached the threshold.
    FailureThreshold,
    /// The error rate within the monitoring window reached the threshold.
    ErrorRate,
    /// The recovery timeout elapsed and a request was admitted.
    RecoveryTimeout,
    /// The background monitor moved a long-open circuit to half-open.
    AutoRecovery,
    /// A probe succeeded while half-open.
    ProbeSucceeded,
    /// An operator forced the circuit closed.
    ManualRecovery,
    /// An operator forced the circuit open.
    ForcedOpen,
    /// The breaker was reset to its initial state.
    Reset,
}

impl TransitionReason {
    /// Returns the reason as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailureThreshold => "failure_threshold",
            Self::ErrorRate => "error_rate",
            Self::RecoveryTimeout => "recovery_timeout",
            Self::AutoRecovery => "auto_recovery",
            Self::ProbeSucceeded => "probe_succeeded",
            Self::ManualRecovery => "manual_recovery",
            Self::ForcedOpen => "forced_open",
            Self::Reset => "reset",
        }
    }
}

/// Audit event for a circuit state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransitionEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Name of the protected service.
    pub service: String,

    /// State before the change.
    pub from: CircuitState,

    /// State after the change.
    pub to: CircuitState,

    /// What caused the change.
    pub reason: TransitionReason,

    /// Consecutive failures at the time of the change.
    pub consecutive_failures: u32,
}

impl StateTransitionEvent {
    /// Creates a transition event stamped now.
    pub fn new(
        service: impl Into<String>,
        from: CircuitState,
        to: CircuitState,
        reason: TransitionReason,
        consecutive_failures: u32,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            service: service.into(),
            from,
            to,
            reason,
            consecutive_failures,
        }
    }
}

impl AuditEvent for StateTransitionEvent {
    fn event_type(&self) -> &'static str {
        "state_transition"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Why a fallback was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    /// The circuit refused the primary.
    CircuitOpen,
    /// The primary failed after all attempts.
    PrimaryFailed,
}

/// Audit event for a request that did not reach the primary work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRejectedEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Name of the protected service.
    pub service: String,

    /// Name of the refused operation.
    pub operation: String,

    /// State of the circuit.
    pub state: CircuitState,

    /// Whether a fallback will be tried.
    pub has_fallback: bool,
}

impl RequestRejectedEvent {
    /// Creates a rejection event stamped now.
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        state: CircuitState,
        has_fallback: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            service: service.into(),
            operation: operation.into(),
            state,
            has_fallback,
        }
    }
}

impl AuditEvent for RequestRejectedEvent {
    fn event_type(&self) -> &'static str {
        "request_rejected"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a completed fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Name of the protected service.
    pub service: String,

    /// Name of the operation.
    pub operation: String,

    /// Why the fallback ran.
    pub cause: FallbackCause,

    /// Whether the fallback produced a value.
    pub succeeded: bool,

    /// The fallback's error, if it failed.
    pub error: Option<String>,
}

impl FallbackEvent {
    /// Creates a fallback event stamped now.
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        cause: FallbackCause,
        error: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            service: service.into(),
            operation: operation.into(),
            cause,
            succeeded: error.is_none(),
            error,
        }
    }
}

impl AuditEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        "fallback"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a state change.
pub fn emit_state_transition(event: &StateTransitionEvent) {
    tracing::info!(
        target: "servicebreaker::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        service = %event.service,
        from = %event.from,
        to = %event.to,
        reason = event.reason.as_str(),
        consecutive_failures = event.consecutive_failures,
        "Circuit state changed"
    );
}

/// Emits an audit event for a refused request.
pub fn emit_request_rejected(event: &RequestRejectedEvent) {
    tracing::info!(
        target: "servicebreaker::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        service = %event.service,
        operation = %event.operation,
        state = %event.state,
        has_fallback = event.has_fallback,
        "Request rejected by open circuit"
    );
}

/// Emits an audit event for a fallback execution.
pub fn emit_fallback(event: &FallbackEvent) {
    let cause = match event.cause {
        FallbackCause::CircuitOpen => "circuit_open",
        FallbackCause::PrimaryFailed => "primary_failed",
    };

    tracing::info!(
        target: "servicebreaker::audit",
        event_type = event.event_type(),
        event_id = %event.event_id,
        service = %event.service,
        operation = %event.operation,
        cause = %cause,
        succeeded = event.succeeded,
        error = ?event.error,
        "Fallback executed"
    );
}

/// Emits an audit event for a periodic health check.
pub fn emit_health_check(metrics: &HealthMetrics) {
    tracing::debug!(
        target: "servicebreaker::audit",
        event_type = "health_check",
        service = %metrics.service_name,
        state = %metrics.circuit_state,
        healthy = metrics.is_healthy,
        total_requests = metrics.total_requests,
        failed_requests = metrics.failed_requests,
        error_rate = metrics.error_rate,
        consecutive_failures = metrics.consecutive_failures,
        average_response_time_ms = metrics.average_response_time.as_millis() as u64,
        "Health check performed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_event_serializes() {
        let event = StateTransitionEvent::new(
            "players-db",
            CircuitState::Closed,
            CircuitState::Open,
            TransitionReason::FailureThreshold,
            5,
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(event.event_type(), "state_transition");
        assert_eq!(json["from"], "closed");
        assert_eq!(json["to"], "open");
        assert_eq!(json["reason"], "failure_threshold");
        assert_eq!(json["consecutive_failures"], 5);
    }

    #[test]
    fn test_fallback_event_success_flag() {
        let ok = FallbackEvent::new("api", "fetch", FallbackCause::CircuitOpen, None);
        assert!(ok.succeeded);

        let failed = FallbackEvent::new(
            "api",
            "fetch",
            FallbackCause::PrimaryFailed,
            Some("cache empty".into()),
        );
        assert!(!failed.succeeded);
        assert_eq!(failed.event_type(), "fallback");
    }

    #[test]
    fn test_rejected_event() {
        let event = RequestRejectedEvent::new("api", "fetch", CircuitState::Open, false);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["state"], "open");
        assert_eq!(json["has_fallback"], false);

        let line = event.to_json().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(&event.event_id.to_string()));
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(TransitionReason::ErrorRate.as_str(), "error_rate");
        assert_eq!(TransitionReason::AutoRecovery.as_str(), "auto_recovery");
    }
}
