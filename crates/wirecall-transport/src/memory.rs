//! In-memory transport for tests and single-process development.
//!
//! Connections are pairs of unbounded channels; a [`MemoryConnector`] and
//! [`MemoryListener`] are joined at construction, so `connect` hands an
//! upgrade request straight to whoever drives the listener. No sockets,
//! no framing, real upgrade semantics: `connect` resolves only once the
//! acceptor completes the upgrade, and a dropped upgrade request surfaces
//! as a failed connection attempt.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, mpsc, oneshot};
use uuid::Uuid;

use crate::error::{TransportError, TransportResult};
use crate::{CLOSE_ABNORMAL, Connection, Connector, HandshakeHeaders, Listener, UpgradeRequest};

#[derive(Debug)]
enum Packet {
    Frame(Bytes),
    Close { code: u16, reason: String },
}

/// One side of an in-memory duplex connection.
#[derive(Debug)]
pub struct MemoryConnection {
    /// Frames to the peer.
    peer_tx: mpsc::UnboundedSender<Packet>,
    /// Frames from the peer.
    rx: Mutex<mpsc::UnboundedReceiver<Packet>>,
    /// Feeds our own receiver, so a local close also wakes local `recv`.
    loopback_tx: mpsc::UnboundedSender<Packet>,
    /// Close observed on this side, remembered for later `recv` calls.
    closed: StdMutex<Option<(u16, String)>>,
}

/// Creates two connected in-memory connection halves.
pub fn pair() -> (MemoryConnection, MemoryConnection) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();

    let left = MemoryConnection {
        peer_tx: right_tx.clone(),
        rx: Mutex::new(left_rx),
        loopback_tx: left_tx.clone(),
        closed: StdMutex::new(None),
    };
    let right = MemoryConnection {
        peer_tx: left_tx,
        rx: Mutex::new(right_rx),
        loopback_tx: right_tx,
        closed: StdMutex::new(None),
    };
    (left, right)
}

impl MemoryConnection {
    fn closed_error(&self) -> Option<TransportError> {
        let closed = self.closed.lock().expect("close state lock");
        closed
            .as_ref()
            .map(|(code, reason)| TransportError::closed(*code, reason.clone()))
    }

    fn mark_closed(&self, code: u16, reason: &str) {
        let mut closed = self.closed.lock().expect("close state lock");
        if closed.is_none() {
            *closed = Some((code, reason.to_string()));
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&self, payload: Bytes) -> TransportResult<()> {
        if let Some(error) = self.closed_error() {
            return Err(error);
        }
        self.peer_tx
            .send(Packet::Frame(payload))
            .map_err(|_| TransportError::closed(CLOSE_ABNORMAL, "peer gone"))
    }

    async fn recv(&self) -> TransportResult<Bytes> {
        if let Some(error) = self.closed_error() {
            return Err(error);
        }
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(Packet::Frame(payload)) => Ok(payload),
            Some(Packet::Close { code, reason }) => {
                self.mark_closed(code, &reason);
                Err(TransportError::closed(code, reason))
            }
            None => {
                self.mark_closed(CLOSE_ABNORMAL, "");
                Err(TransportError::closed(CLOSE_ABNORMAL, ""))
            }
        }
    }

    async fn close(&self, code: u16, reason: &str) -> TransportResult<()> {
        self.mark_closed(code, reason);
        let close = Packet::Close {
            code,
            reason: reason.to_string(),
        };
        // Peer may already be gone; the local wakeup is what matters then.
        let _ = self.peer_tx.send(close);
        let _ = self.loopback_tx.send(Packet::Close {
            code,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

/// An inbound in-memory connection attempt.
#[derive(Debug)]
pub struct MemoryUpgrade {
    handshake: HandshakeHeaders,
    conn: MemoryConnection,
    opened_tx: Option<oneshot::Sender<()>>,
    aborted: AtomicBool,
}

impl MemoryUpgrade {
    /// Builds a detached upgrade request plus the connection half the
    /// requester would hold. Useful for exercising acceptors directly.
    pub fn new(handshake: HandshakeHeaders) -> (Self, MemoryConnection) {
        let (server_side, client_side) = pair();
        let upgrade = Self {
            handshake,
            conn: server_side,
            opened_tx: None,
            aborted: AtomicBool::new(false),
        };
        (upgrade, client_side)
    }

    /// Marks the request as aborted by the requester.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpgradeRequest for MemoryUpgrade {
    fn handshake(&self) -> &HandshakeHeaders {
        &self.handshake
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    async fn accept(self: Box<Self>) -> TransportResult<Box<dyn Connection>> {
        let this = *self;
        if let Some(opened_tx) = this.opened_tx {
            // Connector may have given up waiting; the connection still opens.
            let _ = opened_tx.send(());
        }
        Ok(Box::new(this.conn))
    }
}

/// Creates a joined connector/listener pair.
pub fn listener() -> (MemoryConnector, MemoryListener) {
    let (upgrade_tx, upgrade_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector { upgrade_tx },
        MemoryListener {
            upgrade_rx: Mutex::new(upgrade_rx),
        },
    )
}

/// Initiating side of the in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    upgrade_tx: mpsc::UnboundedSender<MemoryUpgrade>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        url: &str,
        credentials: Option<&str>,
    ) -> TransportResult<Box<dyn Connection>> {
        let (server_side, client_side) = pair();
        let (opened_tx, opened_rx) = oneshot::channel();
        let upgrade = MemoryUpgrade {
            handshake: HandshakeHeaders {
                key: Uuid::new_v4().simple().to_string(),
                protocol: credentials.unwrap_or_default().to_string(),
                extensions: String::new(),
            },
            conn: server_side,
            opened_tx: Some(opened_tx),
            aborted: AtomicBool::new(false),
        };

        self.upgrade_tx
            .send(upgrade)
            .map_err(|_| TransportError::Connect(format!("no listener at {url}")))?;

        // Resolve only once the acceptor completes the upgrade.
        opened_rx
            .await
            .map_err(|_| TransportError::Connect("upgrade never completed".to_string()))?;

        Ok(Box::new(client_side))
    }
}

/// Accepting side of the in-memory transport.
#[derive(Debug)]
pub struct MemoryListener {
    upgrade_rx: Mutex<mpsc::UnboundedReceiver<MemoryUpgrade>>,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&self) -> TransportResult<Box<dyn UpgradeRequest>> {
        let mut upgrade_rx = self.upgrade_rx.lock().await;
        let upgrade = upgrade_rx.recv().await.ok_or(TransportError::ListenerClosed)?;
        Ok(Box::new(upgrade))
    }
}
