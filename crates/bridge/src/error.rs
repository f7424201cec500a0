//! Error types for the live network bridge.

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced by the bridge.
///
/// Note the deliberate asymmetry with the wire protocol itself: once the
/// socket is up, transport hiccups are recovered through retransmission and
/// never raised.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The initial socket connection could not be established
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
}
