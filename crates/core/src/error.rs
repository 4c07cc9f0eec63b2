//! Error types for the lance-mcp server.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! argument validation, vector storage and embedding failures.

use thiserror::Error;

/// Unified error type for the lance-mcp server.
///
/// All fallible functions return `Result<T, AppError>`.
/// Handler failures are turned into error responses; only startup errors end the process.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool arguments that do not match the expected shape
    #[error("Invalid arguments: {0}")]
    Validation(String),

    /// The requested table is not present in the store
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// Vector store failures other than a missing table
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding service failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Returns true if this error means the table is missing.
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, AppError::TableNotFound(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found_message() {
        let err = AppError::TableNotFound("docs".to_string());
        assert_eq!(err.to_string(), "Table 'docs' does not exist");
        assert!(err.is_table_not_found());
    }

    #[test]
    fn test_other_errors_are_not_table_not_found() {
        let err = AppError::Storage("disk full".to_string());
        assert!(!err.is_table_not_found());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
