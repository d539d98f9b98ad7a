//! Server error types.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the acceptor.
///
/// Per-connection protocol violations never surface here; they terminate
/// the offending connection with a close code instead.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Transport failure while upgrading or transmitting.
    #[error("transport error: {0}")]
    Transport(#[from] wirecall_transport::TransportError),

    /// Frame encoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] wirecall_protocol::ProtocolError),
}
