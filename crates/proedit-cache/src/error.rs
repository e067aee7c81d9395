//! Cache subsystem errors.
//!
//! Build and destroy failures never surface here: the cache logs them and
//! degrades to a missing resource. Only setup problems are reported.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse cache configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
