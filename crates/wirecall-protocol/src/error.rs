//! Protocol error types.

use thiserror::Error;

/// Result type for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding frames.
///
/// On the accepting side every decode failure is fatal to the offending
/// connection; on the initiating side decode failures are logged and the
/// frame is dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not a correlation prefix followed by a two-element array.
    #[error("malformed frame")]
    MalformedFrame,

    /// Correlation prefix did not parse as a positive integer.
    #[error("invalid correlation id")]
    InvalidCorrelationId,

    /// Correlation id at or below the connection's watermark.
    #[error("replayed correlation id: {id} <= {watermark}")]
    ReplayedCorrelationId { id: u64, watermark: u64 },

    /// Event label missing, not a string, or outside 1-64 characters.
    #[error("invalid label")]
    InvalidLabel,

    /// Failed to serialize the frame body to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
