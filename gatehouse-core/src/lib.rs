//! Gatehouse Core - configuration, logging and shared error types
//!
//! Everything here is loaded or initialised once at process start and shared
//! read-only by the auth and web crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
