//! Circuit breaker implementation.

use crate::audit::{
    emit_fallback, emit_health_check, emit_request_rejected, emit_state_transition,
    FallbackCause, FallbackEvent, RequestRejectedEvent, StateTransitionEvent, TransitionReason,
};
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::metrics::{rate_as_percentage, round_to_millis, HealthMetrics};
use crate::circuit_breaker::monitor::HealthMonitor;
use crate::circuit_breaker::retry::Backoff;
use crate::circuit_breaker::state::{
    CircuitState, OperationHistory, OperationRecord, RequestCounters, ResponseTimes,
};
use crate::core::{BreakerError, OperationResult, ServiceOperation};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A circuit breaker protecting one named service.
///
/// The breaker tracks the outcome of every execution and sheds load from a
/// failing dependency by refusing work while open.
///
/// # States
///
/// - **Closed**: Normal operation. Requests pass through, failures are counted.
/// - **Open**: Requests are refused (or served by their fallback) until the
///   recovery timeout elapses.
/// - **Half-Open**: Every request is admitted as a probe; the first success
///   closes the circuit.
///
/// The circuit opens when consecutive failures reach `failure_threshold`, or
/// when at least `minimum_throughput` executions inside `monitoring_window`
/// have an error rate of `error_rate_threshold` or more.
///
/// # Example
///
/// ```rust,ignore
/// use servicebreaker::{CircuitBreaker, CircuitBreakerConfig, ServiceOperation};
///
/// let breaker = CircuitBreaker::new("players-db", CircuitBreakerConfig::default());
/// let op = ServiceOperation::new("load-player", || async { db.load(42).await })
///     .retryable(true);
///
/// let result = breaker.execute(&op).await;
/// if let Some(player) = result.data() {
///     println!("{player:?}");
/// }
/// ```
pub struct CircuitBreaker {
    core: Arc<BreakerCore>,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker for `service_name`.
    ///
    /// When `config.enable_background_monitor` is set and a tokio runtime is
    /// current, the health monitor is started; otherwise it is skipped.
    pub fn new(service_name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let core = Arc::new(BreakerCore::new(service_name.into(), config));
        let monitor = if core.config.enable_background_monitor {
            HealthMonitor::spawn(&core)
        } else {
            None
        };

        tracing::debug!(
            service = %core.service_name,
            failure_threshold = core.config.failure_threshold,
            recovery_timeout_ms = core.config.recovery_timeout.as_millis() as u64,
            monitor = monitor.is_some(),
            "Circuit breaker initialized"
        );

        Self {
            core,
            monitor: Mutex::new(monitor),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults(service_name: impl Into<String>) -> Self {
        Self::new(service_name, CircuitBreakerConfig::default())
    }

    /// Returns the name of the protected service.
    pub fn service_name(&self) -> &str {
        &self.core.service_name
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.core.config
    }

    /// Returns the current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.core.read().state
    }

    /// Returns the failures recorded since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.core.read().consecutive_failures
    }

    /// Returns `true` while the background monitor task is running.
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(HealthMonitor::is_running)
    }

    /// Runs `operation` under circuit breaker protection.
    ///
    /// Never panics or returns early with an error: the outcome, including
    /// timeouts and refusals, is reported in the returned [`OperationResult`].
    ///
    /// Timeouts are best-effort. When an attempt times out its future is
    /// dropped, but work it already handed to other tasks keeps running.
    pub async fn execute<T, E>(
        &self,
        operation: &ServiceOperation<'_, T, E>,
    ) -> OperationResult<T, E>
    where
        E: fmt::Display,
    {
        let started = Instant::now();
        let (admitted, state) = self.core.admit();

        if !admitted {
            return self.serve_open_circuit(operation, state, started).await;
        }

        let backoff = Backoff::from_config(&self.core.config);
        let mut attempt = 0;
        let last_error = loop {
            let outcome = self
                .run_attempt(operation.call(), operation.attempt_timeout(), operation.name())
                .await;

            match outcome {
                Ok(data) => {
                    let execution_time = started.elapsed();
                    let state = self.core.record_success(operation.name(), execution_time);
                    return OperationResult {
                        outcome: Ok(data),
                        execution_time,
                        retry_count: attempt,
                        from_fallback: false,
                        circuit_state: state,
                    };
                }
                Err(error) => {
                    if !operation.is_retryable() || !backoff.should_retry(attempt) {
                        break error;
                    }

                    let delay = backoff.delay_after(attempt);
                    tracing::debug!(
                        service = %self.core.service_name,
                        operation = %operation.name(),
                        attempt = attempt + 1,
                        max_retries = backoff.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying operation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        let execution_time = started.elapsed();
        let state = self.core.record_failure(operation.name(), execution_time);

        if let Some(fallback) = operation.call_fallback() {
            match self
                .run_attempt(fallback, operation.fallback_timeout(), operation.name())
                .await
            {
                Ok(data) => {
                    tracing::warn!(
                        service = %self.core.service_name,
                        operation = %operation.name(),
                        error = %last_error,
                        "Operation failed, using fallback"
                    );
                    emit_fallback(&FallbackEvent::new(
                        self.core.service_name.as_str(),
                        operation.name(),
                        FallbackCause::PrimaryFailed,
                        None,
                    ));
                    return OperationResult {
                        outcome: Ok(data),
                        execution_time: started.elapsed(),
                        retry_count: attempt,
                        from_fallback: true,
                        circuit_state: self.state(),
                    };
                }
                Err(fallback_error) => {
                    tracing::error!(
                        service = %self.core.service_name,
                        operation = %operation.name(),
                        error = %last_error,
                        fallback_error = %fallback_error,
                        "Both operation and fallback failed"
                    );
                    emit_fallback(&FallbackEvent::new(
                        self.core.service_name.as_str(),
                        operation.name(),
                        FallbackCause::PrimaryFailed,
                        Some(fallback_error.to_string()),
                    ));
                }
            }
        }

        OperationResult {
            outcome: Err(last_error),
            execution_time,
            retry_count: attempt,
            from_fallback: false,
            circuit_state: state,
        }
    }

    /// Returns a snapshot of this breaker's health.
    pub fn health_metrics(&self) -> HealthMetrics {
        self.core.health_metrics()
    }

    /// Runs one health check immediately.
    ///
    /// This is what the background monitor does on every tick; hosts that
    /// cannot keep a monitor task alive may call it on their own schedule.
    /// Returns the snapshot taken before any auto-recovery.
    pub fn run_health_check(&self) -> HealthMetrics {
        self.core.perform_health_check()
    }

    /// Forces the circuit closed and clears the consecutive failure count.
    pub fn trigger_recovery(&self) {
        tracing::info!(service = %self.core.service_name, "Manual recovery triggered");
        let change = {
            let mut inner = self.core.write();
            inner.consecutive_failures = 0;
            inner.last_success_at = Utc::now();
            inner.transition(CircuitState::Closed, TransitionReason::ManualRecovery)
        };
        self.core.announce(change);
    }

    /// Forces the circuit open, e.g. for a planned maintenance window.
    pub fn force_open(&self) {
        let change = {
            let mut inner = self.core.write();
            inner.mark_failure_time();
            inner.transition(CircuitState::Open, TransitionReason::ForcedOpen)
        };
        self.core.announce(change);
    }

    /// Resets all counters, history and timings, and closes the circuit.
    ///
    /// The configuration is left untouched.
    pub fn reset(&self) {
        let change = {
            let mut inner = self.core.write();
            let previous = inner.state;
            *inner = BreakerInner::new(self.core.config.monitoring_window);
            (previous != CircuitState::Closed).then(|| StateChange {
                from: previous,
                to: CircuitState::Closed,
                reason: TransitionReason::Reset,
                consecutive_failures: 0,
            })
        };
        self.core.announce(change);
        tracing::debug!(service = %self.core.service_name, "Circuit breaker reset");
    }

    /// Stops the background monitor.
    ///
    /// The breaker should be discarded afterwards.
    pub fn destroy(&self) {
        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(monitor) = monitor {
            monitor.stop();
        }
        tracing::debug!(service = %self.core.service_name, "Circuit breaker destroyed");
    }

    async fn serve_open_circuit<T, E>(
        &self,
        operation: &ServiceOperation<'_, T, E>,
        state: CircuitState,
        started: Instant,
    ) -> OperationResult<T, E>
    where
        E: fmt::Display,
    {
        tracing::warn!(
            service = %self.core.service_name,
            operation = %operation.name(),
            state = %state,
            "Circuit open, operation blocked"
        );
        emit_request_rejected(&RequestRejectedEvent::new(
            self.core.service_name.as_str(),
            operation.name(),
            state,
            operation.has_fallback(),
        ));

        let Some(fallback) = operation.call_fallback() else {
            return OperationResult {
                outcome: Err(BreakerError::unavailable(
                    self.core.service_name.as_str(),
                    state,
                )),
                execution_time: started.elapsed(),
                retry_count: 0,
                from_fallback: false,
                circuit_state: state,
            };
        };

        let outcome = self
            .run_attempt(fallback, operation.fallback_timeout(), operation.name())
            .await;
        emit_fallback(&FallbackEvent::new(
            self.core.service_name.as_str(),
            operation.name(),
            FallbackCause::CircuitOpen,
            outcome.as_ref().err().map(ToString::to_string),
        ));

        OperationResult {
            outcome,
            execution_time: started.elapsed(),
            retry_count: 0,
            from_fallback: true,
            circuit_state: self.state(),
        }
    }

    async fn run_attempt<T, E>(
        &self,
        attempt: BoxFuture<'_, Result<T, E>>,
        timeout: Duration,
        operation: &str,
    ) -> Result<T, BreakerError<E>> {
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(error)) => Err(BreakerError::Operation(error)),
            Err(_elapsed) => Err(BreakerError::timeout(
                self.core.service_name.as_str(),
                operation,
                timeout,
            )),
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        let monitor = self
            .monitor
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(monitor) = monitor {
            monitor.stop();
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service_name", &self.core.service_name)
            .field("state", &self.state())
            .field("config", &self.core.config)
            .finish()
    }
}

/// State shared between a breaker and its monitor task.
pub(crate) struct BreakerCore {
    service_name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerInner>,
}

impl BreakerCore {
    fn new(service_name: String, config: CircuitBreakerConfig) -> Self {
        let inner = BreakerInner::new(config.monitoring_window);
        Self {
            service_name,
            config,
            inner: RwLock::new(inner),
        }
    }

    pub(crate) fn service_name(&self) -> &str {
        &self.service_name
    }

    pub(crate) fn health_check_interval(&self) -> Duration {
        self.config.health_check_interval
    }

    fn read(&self) -> RwLockReadGuard<'_, BreakerInner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BreakerInner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts the request and decides admission.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// and admits the request.
    fn admit(&self) -> (bool, CircuitState) {
        let (admitted, state, change) = {
            let mut inner = self.write();
            inner.counters.record_request();

            let current = inner.state;
            match current {
                CircuitState::Closed | CircuitState::HalfOpen => (true, current, None),
                CircuitState::Open => {
                    if inner.open_for_at_least(self.config.recovery_timeout) {
                        let change = inner
                            .transition(CircuitState::HalfOpen, TransitionReason::RecoveryTimeout);
                        (true, inner.state, change)
                    } else {
                        inner.counters.record_rejected();
                        (false, current, None)
                    }
                }
            }
        };
        self.announce(change);
        (admitted, state)
    }

    fn record_success(&self, operation: &str, response_time: Duration) -> CircuitState {
        let (state, change) = {
            let mut inner = self.write();
            inner.counters.record_success();
            inner.consecutive_failures = 0;
            inner.last_success_at = Utc::now();
            inner.response_times.push(response_time);
            inner.history.record(OperationRecord {
                timestamp: Instant::now(),
                success: true,
                response_time,
                operation: operation.to_string(),
            });

            let change = if inner.state.is_half_open() {
                inner.transition(CircuitState::Closed, TransitionReason::ProbeSucceeded)
            } else {
                None
            };
            (inner.state, change)
        };
        self.announce(change);
        state
    }

    fn record_failure(&self, operation: &str, response_time: Duration) -> CircuitState {
        let (state, change) = {
            let mut inner = self.write();
            inner.counters.record_failure();
            inner.consecutive_failures += 1;
            inner.mark_failure_time();
            inner.history.record(OperationRecord {
                timestamp: Instant::now(),
                success: false,
                response_time,
                operation: operation.to_string(),
            });

            let change = match self.trip_reason(&inner) {
                Some(reason) => inner.transition(CircuitState::Open, reason),
                None => None,
            };
            (inner.state, change)
        };
        self.announce(change);
        state
    }

    fn trip_reason(&self, inner: &BreakerInner) -> Option<TransitionReason> {
        if inner.consecutive_failures >= self.config.failure_threshold {
            return Some(TransitionReason::FailureThreshold);
        }

        let (samples, failures) = inner.history.window_counts(Instant::now());
        if samples > 0 && samples >= self.config.minimum_throughput as usize {
            let error_rate = failures as f64 / samples as f64;
            if error_rate >= self.config.error_rate_threshold {
                return Some(TransitionReason::ErrorRate);
            }
        }

        None
    }

    pub(crate) fn health_metrics(&self) -> HealthMetrics {
        let inner = self.read();
        let failure_rate = inner.counters.failure_rate();
        let is_healthy = !inner.state.is_open()
            && failure_rate < self.config.error_rate_threshold
            && inner.consecutive_failures < self.config.failure_threshold;

        HealthMetrics {
            service_name: self.service_name.clone(),
            total_requests: inner.counters.total_requests,
            successful_requests: inner.counters.successful_requests,
            failed_requests: inner.counters.failed_requests,
            rejected_requests: inner.counters.rejected_requests,
            times_opened: inner.counters.times_opened,
            error_rate: rate_as_percentage(failure_rate),
            average_response_time: round_to_millis(inner.response_times.average()),
            last_success_time: inner.last_success_at,
            last_failure_time: inner.last_failure_at,
            circuit_state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            uptime: inner.started.elapsed(),
            is_healthy,
        }
    }

    /// One monitor tick: report health, then try auto-recovery.
    pub(crate) fn perform_health_check(&self) -> HealthMetrics {
        let metrics = self.health_metrics();
        emit_health_check(&metrics);

        if !metrics.is_healthy {
            tracing::warn!(
                service = %self.service_name,
                error_rate = metrics.error_rate,
                consecutive_failures = metrics.consecutive_failures,
                state = %metrics.circuit_state,
                "Service health check - unhealthy"
            );
        }

        let change = {
            let mut inner = self.write();
            if inner.state.is_open()
                && inner.open_for_at_least(self.config.recovery_timeout.saturating_mul(2))
            {
                tracing::info!(service = %self.service_name, "Attempting auto-recovery");
                inner.transition(CircuitState::HalfOpen, TransitionReason::AutoRecovery)
            } else {
                None
            }
        };
        self.announce(change);

        metrics
    }

    fn announce(&self, change: Option<StateChange>) {
        let Some(change) = change else {
            return;
        };

        match change.to {
            CircuitState::Open => tracing::warn!(
                service = %self.service_name,
                from = %change.from,
                reason = change.reason.as_str(),
                consecutive_failures = change.consecutive_failures,
                "Circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                service = %self.service_name,
                reason = change.reason.as_str(),
                "Circuit breaker transitioning to half-open"
            ),
            CircuitState::Closed => tracing::info!(
                service = %self.service_name,
                reason = change.reason.as_str(),
                "Circuit breaker closed"
            ),
        }

        emit_state_transition(&StateTransitionEvent::new(
            self.service_name.as_str(),
            change.from,
            change.to,
            change.reason,
            change.consecutive_failures,
        ));
    }
}

/// A state change to report once the lock is released.
struct StateChange {
    from: CircuitState,
    to: CircuitState,
    reason: TransitionReason,
    consecutive_failures: u32,
}

/// Mutable breaker state, guarded by a single lock.
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: DateTime<Utc>,
    counters: RequestCounters,
    response_times: ResponseTimes,
    history: OperationHistory,
    started: Instant,
}

impl BreakerInner {
    fn new(monitoring_window: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            last_failure_at: None,
            last_success_at: Utc::now(),
            counters: RequestCounters::new(),
            response_times: ResponseTimes::new(),
            history: OperationHistory::new(monitoring_window),
            started: Instant::now(),
        }
    }

    fn mark_failure_time(&mut self) {
        self.last_failure = Some(Instant::now());
        self.last_failure_at = Some(Utc::now());
    }

    /// Whether at least `duration` has passed since the last failure.
    fn open_for_at_least(&self, duration: Duration) -> bool {
        self.last_failure
            .map_or(true, |failed_at| failed_at.elapsed() >= duration)
    }

    fn transition(&mut self, to: CircuitState, reason: TransitionReason) -> Option<StateChange> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        if to.is_open() {
            self.counters.record_opened();
        }
        Some(StateChange {
            from,
            to,
            reason,
            consecutive_failures: self.consecutive_failures,
        })
    }
}
