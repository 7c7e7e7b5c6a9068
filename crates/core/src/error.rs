//! Core Error Types
//!
//! Defines the foundational error types used across the Office Copilot workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! Configuration and loading errors live in the main crate's `AppError`.

use thiserror::Error;

/// Error reported by a host callback.
///
/// Host implementations of the operation, confirmation and undo contracts
/// return these; the executor turns them into failed step results.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Document operation failures reported by the host
    #[error("Operation error: {0}")]
    Operation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create an operation error
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::internal("host bridge closed");
        assert_eq!(err.to_string(), "Internal error: host bridge closed");
    }

    #[test]
    fn test_error_conversion() {
        let err = CoreError::operation("document is read-only");
        let msg: String = err.into();
        assert_eq!(msg, "Operation error: document is read-only");
    }
}
