//! Channel error types.
//!
//! None of these are fatal to the wider system: a failed channel
//! degrades connectivity while polling remains the fallback of record.

use std::time::Duration;

/// Push-channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Endpoint could not be parsed or reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Handshake or connect attempt exceeded its bound.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Subscribe message could not be delivered.
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Underlying transport error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Transport closed by the peer.
    #[error("Connection closed: {reason}")]
    ConnectionClosed {
        /// Close reason.
        reason: String,
        /// Close code, when the peer sent one.
        code: Option<u16>,
    },
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;
