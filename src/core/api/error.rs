//! Error types for the Boundlexx API client.

/// Result type alias using [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur while talking to the Boundlexx REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network/HTTP transport errors.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success status returned by the API.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, or the canonical reason when the body is empty.
        message: String,
    },

    /// A single-entity lookup returned 404.
    #[error("{operation}: no record with key {key}")]
    NotFound {
        operation: &'static str,
        key: String,
    },

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The schema document could not be used to build a client.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The schema document does not define the requested operation.
    #[error("Operation not present in API definition: {0}")]
    UnknownOperation(&'static str),

    /// A base URL, cursor or path could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        ApiError::Schema(msg.into())
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ApiError::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this is a terminal "not found" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. } | ApiError::Api { status: 404, .. })
    }

    /// Get the HTTP status code, if the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
