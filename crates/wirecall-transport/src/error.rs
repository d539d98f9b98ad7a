//! Transport error types.

use std::io;

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur at the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection was closed, locally or by the peer.
    #[error("connection closed ({code}): {reason}")]
    Closed { code: u16, reason: String },

    /// IO error on the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connect address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Handshake payload was missing or unreadable.
    #[error("invalid handshake: {0}")]
    Handshake(String),

    /// Frame exceeds the stream transport's size cap.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u32, max: u32 },

    /// The listener stopped accepting connections.
    #[error("listener closed")]
    ListenerClosed,
}

impl TransportError {
    /// Creates a `Closed` error.
    pub fn closed(code: u16, reason: impl Into<String>) -> Self {
        Self::Closed {
            code,
            reason: reason.into(),
        }
    }

    /// Returns true if this error reports a closed connection.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}
