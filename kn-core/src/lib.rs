//! Kinnect Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Kinnect crates:
//! - Application configuration (server URL, session token, realtime policy)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Common constants and type aliases

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{KnError, KnResult};
pub use logging::init_logging;
