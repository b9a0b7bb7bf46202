//! The operation descriptor handed to a circuit breaker.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Default timeout for a primary attempt when none is given.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a fallback when none is given.
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

type OperationFn<'a, T, E> = Box<dyn Fn() -> BoxFuture<'a, Result<T, E>> + Send + Sync + 'a>;

/// A named unit of work protected by a circuit breaker.
///
/// The primary closure is called once per attempt, so it must be callable
/// repeatedly. Only mark an operation [`retryable`](Self::retryable) when it
/// is idempotent.
///
/// # Example
///
/// ```rust
/// use servicebreaker::ServiceOperation;
/// use std::time::Duration;
///
/// let op = ServiceOperation::new("load-player", || async { Ok::<_, String>(42) })
///     .with_fallback(|| async { Ok(0) })
///     .with_timeout(Duration::from_secs(5))
///     .retryable(true);
///
/// assert_eq!(op.name(), "load-player");
/// assert!(op.has_fallback());
/// ```
pub struct ServiceOperation<'a, T, E> {
    name: String,
    execute: OperationFn<'a, T, E>,
    fallback: Option<OperationFn<'a, T, E>>,
    timeout: Option<Duration>,
    retryable: bool,
}

impl<'a, T, E> ServiceOperation<'a, T, E>
where
    T: Send + 'a,
    E: Send + 'a,
{
    /// Creates a new operation from a name and a closure producing the work.
    pub fn new<F, Fut>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            name: name.into(),
            execute: Box::new(move || execute().boxed()),
            fallback: None,
            timeout: None,
            retryable: false,
        }
    }

    /// Sets the alternate work used when the circuit is open or the primary is exhausted.
    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        self.fallback = Some(Box::new(move || fallback().boxed()));
        self
    }

    /// Sets the per-attempt timeout, applied to the primary and the fallback alike.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the operation as safe to retry.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl<'a, T, E> ServiceOperation<'a, T, E> {
    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if a fallback is configured.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Returns `true` if the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the explicit timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Timeout applied to each primary attempt.
    pub(crate) fn attempt_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT)
    }

    /// Timeout applied to the fallback.
    pub(crate) fn fallback_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_FALLBACK_TIMEOUT)
    }

    pub(crate) fn call(&self) -> BoxFuture<'a, Result<T, E>> {
        (self.execute)()
    }

    pub(crate) fn call_fallback(&self) -> Option<BoxFuture<'a, Result<T, E>>> {
        self.fallback.as_ref().map(|fallback| fallback())
    }
}

impl<T, E> fmt::Debug for ServiceOperation<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOperation")
            .field("name", &self.name)
            .field("has_fallback", &self.fallback.is_some())
            .field("timeout", &self.timeout)
            .field("retryable", &self.retryable)
            .finish()
    }
}
