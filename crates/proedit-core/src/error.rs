//! Error types for ProEdit.

use thiserror::Error;

/// Main error type for ProEdit operations.
#[derive(Error, Debug)]
pub enum ProEditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Resource already destroyed: {0}")]
    Destroyed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for ProEdit operations.
pub type Result<T> = std::result::Result<T, ProEditError>;
