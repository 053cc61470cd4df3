//! Common error types and handling for Aidline

use crate::state::StateError;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Aidline workspace
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the error code used in logs and transient UI notices
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Gateway(_) => "GATEWAY_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::State(_) => "STATE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error must abort startup rather than degrade at runtime
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
