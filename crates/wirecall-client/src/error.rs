//! Client error types.

use std::fmt;

use wirecall_protocol::ProtocolError;
use wirecall_transport::TransportError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client session.
#[derive(Debug)]
pub enum ClientError {
    /// Sent while the session was not open. Sends are never queued.
    NotConnected,
    /// The connection was lost while the call was outstanding.
    SocketClosed,
    /// The peer answered the call with a failure reply.
    Reply(String),
    /// Frame encoding or decoding failed.
    Protocol(ProtocolError),
    /// The transport failed to carry the frame.
    Transport(TransportError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::SocketClosed => write!(f, "socket closed"),
            Self::Reply(message) => write!(f, "reply error: {}", message),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::Transport(err) => write!(f, "transport error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}
