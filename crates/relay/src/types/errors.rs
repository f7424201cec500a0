//! Error types for the chat relay.

use thiserror::Error;

/// Result type alias for relay operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat relay
#[derive(Debug, Error)]
pub enum ChatError {
    /// An operation requiring an active chat was attempted while the relay was idle.
    /// This always indicates a caller-sequencing bug and is never swallowed.
    #[error("chat is not active")]
    NotActive,

    /// An unknown interface or member id was referenced, meaning relay and
    /// participant state have diverged.
    #[error("internal relay error: {message}")]
    Internal { message: String },
}

impl ChatError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_helper() {
        let error = ChatError::internal("unknown member m1");
        assert!(matches!(error, ChatError::Internal { .. }));
        assert_eq!(error.to_string(), "internal relay error: unknown member m1");
    }

    #[test]
    fn test_not_active_display() {
        assert_eq!(ChatError::NotActive.to_string(), "chat is not active");
    }
}
