//! A lazily created, resettable registry handle.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::registry::CircuitBreakerRegistry;

use std::sync::{Arc, Mutex};

/// A cloneable handle to one process-wide [`CircuitBreakerRegistry`].
///
/// Create one at startup and pass clones to every component that needs
/// circuit breakers. All clones see the same registry; it is built on the
/// first [`get`](Self::get) and replaced after [`reset`](Self::reset).
///
/// # Example
///
/// ```rust
/// use servicebreaker::{CircuitBreakerConfig, SharedRegistry};
///
/// let shared = SharedRegistry::new(CircuitBreakerConfig::default());
/// let handle = shared.clone();
///
/// let a = shared.get();
/// let b = handle.get();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    default_config: CircuitBreakerConfig,
    slot: Arc<Mutex<Option<Arc<CircuitBreakerRegistry>>>>,
}

impl SharedRegistry {
    /// Creates an uninitialized handle.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wraps an already built registry.
    pub fn from_registry(registry: CircuitBreakerRegistry) -> Self {
        Self {
            default_config: registry.default_config().clone(),
            slot: Arc::new(Mutex::new(Some(Arc::new(registry)))),
        }
    }

    /// Returns the registry, creating it on first use.
    pub fn get(&self) -> Arc<CircuitBreakerRegistry> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let registry = slot.get_or_insert_with(|| {
            tracing::debug!("Creating circuit breaker registry");
            Arc::new(CircuitBreakerRegistry::new(self.default_config.clone()))
        });
        Arc::clone(registry)
    }

    /// Returns `true` if the registry has been created.
    pub fn is_initialized(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Destroys every breaker and drops the registry.
    ///
    /// The next [`get`](Self::get) builds a fresh, empty registry. Callers
    /// still holding the old `Arc` keep a registry with no breakers.
    pub fn reset(&self) {
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(registry) = previous {
            registry.destroy_all();
            tracing::info!("Circuit breaker registry reset");
        }
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
