//! Store persistence errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        StoreError::Storage(msg.into())
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
