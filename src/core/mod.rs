//! Core types for the servicebreaker library.
//!
//! - [`error`] - The `BreakerError` sum type and configuration errors
//! - [`operation`] - The `ServiceOperation` descriptor
//! - [`result`] - The `OperationResult` returned by every execution

pub mod error;
pub mod operation;
pub mod result;

pub use error::{BreakerError, ConfigError, ConfigResult};
pub use operation::{ServiceOperation, DEFAULT_FALLBACK_TIMEOUT, DEFAULT_OPERATION_TIMEOUT};
pub use result::OperationResult;
