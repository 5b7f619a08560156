//! Configuration types for prelog.
//!
//! Configuration is resolved once per process from built-in defaults, an
//! optional `config.yaml`, and environment overrides. Resolution never fails
//! the host process: anything unusable falls back with a warning.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
