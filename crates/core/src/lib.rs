//! lance-mcp core library
//!
//! Foundational utilities shared by the lance-mcp crates:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{AppError, AppResult};
