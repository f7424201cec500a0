//! Error types for the REST collaborator client.

use thiserror::Error;

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the typed API client
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport could not complete the request at all
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The backend answered with a non-success status code
    #[error("unexpected status code: {code}")]
    Status { code: u16 },

    /// The response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
