//! Structured audit logging for circuit breaker activity.
//!
//! Events are emitted through `tracing` on the `servicebreaker::audit`
//! target, so any subscriber (JSON file, OpenTelemetry, etc.) can capture
//! state changes, rejections and fallbacks separately from diagnostics.

mod events;

pub use events::{
    emit_fallback, emit_health_check, emit_request_rejected, emit_state_transition, AuditEvent,
    FallbackCause, FallbackEvent, RequestRejectedEvent, StateTransitionEvent, TransitionReason,
};
