//! Wire framing and request/reply correlation for wirecall.
//!
//! This crate defines the frame format shared by the initiating and
//! accepting sides of a wirecall connection.
//!
//! # Wire Format
//!
//! A frame is an optional ASCII decimal correlation id followed, with no
//! separator, by a two-element JSON array:
//!
//! ```text
//! 42["get_user",{"id":7}]     correlated call
//! 42[null,{"name":"ada"}]     success reply
//! 42["not found",null]        failure reply
//! ["presence",{"online":3}]   uncorrelated event
//! ```
//!
//! The correlation id prefix is emitted only when nonzero. A correlated
//! frame is either a call (label = event name) or a reply (label = null on
//! success, an error string on failure). The empty frame is the keep-alive
//! heartbeat and decodes to nothing.
//!
//! # Example
//!
//! ```rust
//! use wirecall_protocol::{Frame, encode_frame, decode_frame};
//!
//! let frame = Frame::call(1, "ping", None);
//! let bytes = encode_frame(&frame).unwrap();
//! let decoded = decode_frame(&bytes, None).unwrap().unwrap();
//! assert_eq!(decoded, frame);
//! ```

mod error;
mod framing;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{Frame, decode_frame, encode_frame, is_valid_label};

/// Maximum length of an event label, in characters.
pub const MAX_LABEL_LEN: usize = 64;

/// Close code sent when a connection is rejected at upgrade time.
pub const CLOSE_REJECTED: u16 = 4000;

/// Close code sent when a frame fails validation.
pub const CLOSE_PROTOCOL: u16 = 4001;

/// Broadcast topic reserved for the keep-alive heartbeat.
pub const KEEPALIVE_TOPIC: &str = "ping";
