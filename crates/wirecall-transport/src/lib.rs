//! Transport primitives for wirecall.
//!
//! The protocol core never touches sockets directly; it consumes the
//! traits defined here. A transport supplies four things:
//!
//! - [`Connector`] — the initiating side's way in: `connect(url, credentials)`.
//! - [`Connection`] — a live duplex, message-oriented channel.
//! - [`Listener`] / [`UpgradeRequest`] — the accepting side's admission
//!   surface: each inbound connection arrives as an upgrade request whose
//!   negotiation headers are captured before the handshake completes.
//! - [`Broker`] — a publish/subscribe hub for broadcast fan-out.
//!
//! Two transports ship with the crate: [`memory`] (channel-paired, for
//! tests and single-process development) and [`stream`] (length-prefixed
//! frames over any byte stream, with TCP connector and acceptor).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod broker;
pub mod error;
pub mod memory;
pub mod stream;

pub use broker::Broker;
pub use error::{TransportError, TransportResult};

/// Close code for a clean, caller-initiated close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when a connection went away without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Negotiation headers captured at upgrade time.
///
/// These mirror the `Sec-WebSocket-Key` / `-Protocol` / `-Extensions`
/// headers of a WebSocket upgrade. Credentials travel as the protocol,
/// the same way a browser client passes a token as the subprotocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeHeaders {
    /// Nonce identifying the handshake.
    pub key: String,
    /// Negotiated protocol; carries the caller's credentials.
    pub protocol: String,
    /// Negotiated extensions.
    pub extensions: String,
}

/// A live duplex connection carrying whole frames.
#[async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Transmits one frame.
    async fn send(&self, payload: Bytes) -> TransportResult<()>;

    /// Receives the next frame.
    ///
    /// Returns [`TransportError::Closed`] once the connection is closed;
    /// the error carries the close code and reason.
    async fn recv(&self) -> TransportResult<Bytes>;

    /// Closes the connection with a code and reason.
    async fn close(&self, code: u16, reason: &str) -> TransportResult<()>;
}

/// Establishes outbound connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connects to `url`, presenting optional credentials.
    ///
    /// Resolves once the peer has completed the handshake.
    async fn connect(
        &self,
        url: &str,
        credentials: Option<&str>,
    ) -> TransportResult<Box<dyn Connection>>;
}

/// An inbound connection attempt, pre-handshake.
///
/// The acceptor decides what to do with it: authenticate, then [`accept`]
/// to complete the handshake (even when the connection will be closed
/// right after), or drop it if the request was aborted.
///
/// [`accept`]: UpgradeRequest::accept
#[async_trait]
pub trait UpgradeRequest: Send {
    /// Negotiation headers captured from the request.
    fn handshake(&self) -> &HandshakeHeaders;

    /// Returns true if the requester went away before the upgrade completed.
    fn is_aborted(&self) -> bool;

    /// Completes the handshake and yields the live connection.
    async fn accept(self: Box<Self>) -> TransportResult<Box<dyn Connection>>;
}

/// Produces upgrade requests for inbound connections.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Waits for the next inbound connection attempt.
    async fn accept(&self) -> TransportResult<Box<dyn UpgradeRequest>>;
}
