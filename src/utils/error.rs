//! Error Handling
//!
//! Unified error types for the crate.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only construction and configuration loading return these errors. Runtime
//! faults (failed operations, rejected transitions, cache faults) are recovered
//! locally and reported through results.

use thiserror::Error;

use office_copilot_core::CoreError;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Errors from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid regex in a configured pattern set
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// TOML configuration parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for crate errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
