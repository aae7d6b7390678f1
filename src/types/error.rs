//! Error types for Scriptgate

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for GateError {
    fn from(e: std::io::Error) -> Self {
        GateError::Internal(e.to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GateError>;
