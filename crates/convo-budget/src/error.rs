//! Error types for configuration and transcript loading.
//!
//! The budget engine itself never fails; only the surfaces that read files or
//! validate user-supplied settings return [`ContextResult`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Invalid context config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for fallible context operations.
pub type ContextResult<T> = Result<T, ContextError>;
