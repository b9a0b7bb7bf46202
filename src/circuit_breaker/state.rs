//! Circuit breaker state machine and rolling statistics.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The operating mode of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Circuit is closed; requests pass through normally.
    #[default]
    Closed,

    /// Circuit is open; requests are rejected or served by a fallback.
    Open,

    /// Circuit is half-open; requests are admitted as recovery probes.
    HalfOpen,
}

impl CircuitState {
    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen)
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One completed primary execution, kept for error-rate evaluation.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// When the execution was recorded.
    pub timestamp: Instant,
    /// Whether it succeeded.
    pub success: bool,
    /// Time spent in `execute`, retries included.
    pub response_time: Duration,
    /// Name of the operation.
    pub operation: String,
}

/// Executions recorded within the trailing monitoring window.
#[derive(Debug, Clone)]
pub struct OperationHistory {
    window: Duration,
    entries: VecDeque<OperationRecord>,
}

impl OperationHistory {
    /// Creates an empty history covering `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    /// Appends a record and drops everything older than the window.
    pub fn record(&mut self, record: OperationRecord) {
        let now = record.timestamp;
        self.entries.push_back(record);
        self.prune(now);
    }

    /// Drops entries recorded more than one window before `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.timestamp) > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns `(samples, failures)` within the window ending at `now`.
    pub fn window_counts(&self, now: Instant) -> (usize, usize) {
        self.entries
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.timestamp) <= self.window)
            .fold((0, 0), |(samples, failures), entry| {
                (samples + 1, failures + usize::from(!entry.success))
            })
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &OperationRecord> {
        self.entries.iter()
    }
}

/// Recent response times for average-latency reporting.
///
/// Holds at most [`ResponseTimes::CAPACITY`] samples; when a push exceeds
/// that, only the newest [`ResponseTimes::RETAIN`] are kept.
#[derive(Debug, Clone, Default)]
pub struct ResponseTimes {
    samples: VecDeque<Duration>,
}

impl ResponseTimes {
    /// Maximum number of samples held.
    pub const CAPACITY: usize = 100;
    /// Number of samples kept after an overflow.
    pub const RETAIN: usize = 50;

    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample, trimming on overflow.
    pub fn push(&mut self, sample: Duration) {
        self.samples.push_back(sample);
        if self.samples.len() > Self::CAPACITY {
            let excess = self.samples.len() - Self::RETAIN;
            self.samples.drain(..excess);
        }
    }

    /// Mean of the retained samples, or zero if empty.
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Request counters, monotonically non-decreasing until reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounters {
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
}

impl RequestCounters {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an incoming request.
    pub fn record_request(&mut self) {
        self.total_requests += 1;
    }

    /// Records a successful execution.
    pub fn record_success(&mut self) {
        self.successful_requests += 1;
    }

    /// Records a failed execution.
    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    /// Records a rejected request.
    pub fn record_rejected(&mut self) {
        self.rejected_requests += 1;
    }

    /// Records that the circuit opened.
    pub fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    /// Failed executions over all requests (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(timestamp: Instant, success: bool) -> OperationRecord {
        OperationRecord {
            timestamp,
            success,
            response_time: Duration::from_millis(1),
            operation: "op".to_string(),
        }
    }

    #[test]
    fn test_circuit_state_default() {
        assert!(CircuitState::default().is_closed());
    }

    #[test]
    fn test_circuit_state_names() {
        assert_eq!(CircuitState::Closed.name(), "closed");
        assert_eq!(CircuitState::Open.name(), "open");
        assert_eq!(CircuitState::HalfOpen.name(), "half-open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
    }

    #[test]
    fn test_circuit_state_serde() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"half-open\"");
        let state: CircuitState = serde_json::from_str("\"open\"").unwrap();
        assert!(state.is_open());
    }

    #[test]
    fn test_counters() {
        let mut counters = RequestCounters::new();
        assert_eq!(counters.failure_rate(), 0.0);

        for _ in 0..4 {
            counters.record_request();
        }
        counters.record_success();
        counters.record_failure();
        counters.record_rejected();

        assert_eq!(counters.total_requests, 4);
        assert_eq!(counters.successful_requests, 1);
        assert_eq!(counters.rejected_requests, 1);
        assert!((counters.failure_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_history_prunes_outside_window() {
        let start = Instant::now();
        let mut history = OperationHistory::new(Duration::from_secs(10));

        history.record(record_at(start, false));
        history.record(record_at(start + Duration::from_secs(5), true));
        assert_eq!(history.len(), 2);

        history.record(record_at(start + Duration::from_secs(12), true));
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.success));
    }

    #[test]
    fn test_history_window_counts() {
        let start = Instant::now();
        let mut history = OperationHistory::new(Duration::from_secs(60));
        history.record(record_at(start, false));
        history.record(record_at(start, true));
        history.record(record_at(start, false));

        assert_eq!(history.window_counts(start), (3, 2));
        assert_eq!(history.window_counts(start + Duration::from_secs(61)), (0, 0));
    }

    #[test]
    fn test_response_times_trim() {
        let mut times = ResponseTimes::new();
        for ms in 0..ResponseTimes::CAPACITY as u64 {
            times.push(Duration::from_millis(ms));
        }
        assert_eq!(times.len(), ResponseTimes::CAPACITY);

        times.push(Duration::from_millis(1000));
        assert_eq!(times.len(), ResponseTimes::RETAIN);
    }

    #[test]
    fn test_response_times_average() {
        let mut times = ResponseTimes::new();
        assert_eq!(times.average(), Duration::ZERO);

        times.push(Duration::from_millis(10));
        times.push(Duration::from_millis(30));
        assert_eq!(times.average(), Duration::from_millis(20));
    }
}
