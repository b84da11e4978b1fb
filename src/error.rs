//! Error types for the command assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Fallback Responder Errors
    // =============================

    #[error("Responder error: {0}")]
    ResponderError(String),

    #[error("Responder timed out after {0} ms")]
    ResponderTimeout(u64),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // Flow / Pipeline Errors
    // =============================

    #[error("No flow is open")]
    NoActiveFlow,

    #[error("Invalid flow transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid flow edit: {0}")]
    InvalidEdit(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
