//! File-based registry settings.
//!
//! Settings are TOML. A `[defaults]` table adjusts the built-in defaults and
//! each `[services.<name>]` table configures one service, optionally starting
//! from a named profile. Durations are given in milliseconds (`*_ms` keys).

mod loader;
mod schema;

pub use schema::{RegistrySettings, ServiceSettings};
