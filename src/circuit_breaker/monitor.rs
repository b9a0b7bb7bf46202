//! Background health monitor.

use crate::circuit_breaker::breaker::BreakerCore;

use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Periodic task that runs health checks for one breaker.
///
/// The task only holds a weak reference, so it ends on its own once the
/// breaker is gone; [`HealthMonitor::stop`] ends it immediately.
#[derive(Debug)]
pub(crate) struct HealthMonitor {
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Starts the monitor on the current tokio runtime.
    ///
    /// Returns `None` when no runtime is available to host the task.
    pub(crate) fn spawn(core: &Arc<BreakerCore>) -> Option<Self> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::debug!(
                    service = %core.service_name(),
                    "No tokio runtime available, health monitoring disabled"
                );
                return None;
            }
        };

        let period = core.health_check_interval();
        if period.is_zero() {
            tracing::warn!(
                service = %core.service_name(),
                "Health check interval is zero, health monitoring disabled"
            );
            return None;
        }

        let weak: Weak<BreakerCore> = Arc::downgrade(core);

        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(core) = weak.upgrade() else {
                    break;
                };
                core.perform_health_check();
            }
        });

        tracing::debug!(
            service = %core.service_name(),
            interval_ms = period.as_millis() as u64,
            "Health monitoring started"
        );

        Some(Self { handle })
    }

    /// Returns `true` while the task is alive.
    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancels the task.
    pub(crate) fn stop(self) {
        self.handle.abort();
    }
}
