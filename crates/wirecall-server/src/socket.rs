//! Accepting side of the wirecall protocol.
//!
//! A [`SocketServer`] admits upgrade requests (authenticating them when an
//! authenticator is installed), keeps the registry of live connections,
//! dispatches inbound frames to the installed message handler, and
//! broadcasts the keep-alive heartbeat.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wirecall_protocol::{
    CLOSE_PROTOCOL, CLOSE_REJECTED, Frame, KEEPALIVE_TOPIC, ProtocolError, decode_frame,
    encode_frame, is_valid_label,
};
use wirecall_transport::{Broker, Connection, Listener, UpgradeRequest};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{Behaviour, MessageContext, Responder};
use crate::registry::{ConnectionEntry, ConnectionRegistry};

/// Handle to an acceptor.
///
/// Cloning is cheap; all clones share the same registry and behaviour.
#[derive(Clone)]
pub struct SocketServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    behaviour: Behaviour,
    registry: ConnectionRegistry,
    broker: Broker,
    keepalive: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        if let Some(task) = self.keepalive.lock().expect("keepalive task lock").take() {
            task.abort();
        }
    }
}

impl SocketServer {
    /// Creates a server with the given configuration and handlers, and
    /// starts the keep-alive heartbeat.
    pub fn new(config: ServerConfig, behaviour: Behaviour) -> Self {
        let inner = Arc::new(ServerInner {
            behaviour,
            registry: ConnectionRegistry::default(),
            broker: Broker::new(),
            keepalive: std::sync::Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.keepalive_interval);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { return };
                inner.broker.publish(KEEPALIVE_TOPIC, Bytes::new());
            }
        });
        *inner.keepalive.lock().expect("keepalive task lock") = Some(heartbeat);

        Self { inner }
    }

    /// Accepts upgrade requests from a listener until it fails.
    pub async fn run<L: Listener>(&self, listener: L) -> ServerResult<()> {
        loop {
            let request = listener.accept().await?;
            self.upgrade(request).await?;
        }
    }

    /// Runs the admission flow for one upgrade request.
    ///
    /// Authentication happens first; the handshake then completes
    /// unconditionally so a rejected requester still learns why (close
    /// code 4000 with the rejection reason). Only accepted connections
    /// are registered and see the `open` handler.
    ///
    /// An authenticator panic propagates out of this call: programming
    /// errors are not converted into rejections.
    pub async fn upgrade(&self, request: Box<dyn UpgradeRequest>) -> ServerResult<()> {
        let id = Uuid::new_v4();
        let handshake = request.handshake().clone();

        let mut close_reason = None;
        let mut user_data: Option<Value> = None;
        if let Some(authenticator) = &self.inner.behaviour.authentication {
            match authenticator(handshake).await {
                Ok(data) => user_data = data,
                Err(rejection) => close_reason = Some(rejection.reason),
            }
        }

        if request.is_aborted() {
            debug!(id = %id, "upgrade aborted during authentication");
            return Ok(());
        }

        let conn: Arc<dyn Connection> = Arc::from(request.accept().await?);

        if let Some(reason) = close_reason {
            info!(id = %id, reason = %reason, "connection rejected");
            let _ = conn.close(CLOSE_REJECTED, &reason).await;
            return Ok(());
        }

        let entry = Arc::new(ConnectionEntry::new(id, user_data, conn));
        self.inner.registry.insert(entry.clone()).await;
        self.subscribe_keepalive(&entry);
        info!(id = %id, "connection open");
        if let Some(open) = &self.inner.behaviour.open {
            open(entry.info());
        }

        let server = self.clone();
        tokio::spawn(async move {
            server.run_connection(entry).await;
        });
        Ok(())
    }

    /// Sends an uncorrelated event to one connection.
    ///
    /// An unknown id is a silent no-op; the connection may have just
    /// closed.
    pub async fn send(&self, id: Uuid, event: &str, payload: Option<Value>) -> ServerResult<()> {
        let Some(entry) = self.inner.registry.get(&id).await else {
            return Ok(());
        };
        let bytes = encode_frame(&Frame::event(event, payload))?;
        entry.conn.send(Bytes::from(bytes)).await?;
        Ok(())
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.registry.len().await
    }

    /// Forwards broker payloads for the keep-alive topic to the connection.
    fn subscribe_keepalive(&self, entry: &Arc<ConnectionEntry>) {
        let mut heartbeat_rx = self.inner.broker.subscribe(KEEPALIVE_TOPIC);
        let conn = entry.conn.clone();
        let forward = tokio::spawn(async move {
            loop {
                match heartbeat_rx.recv().await {
                    Ok(payload) => {
                        if conn.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                }
            }
        });
        *entry.keepalive.lock().expect("keepalive slot lock") = Some(forward);
    }

    /// Reads frames until the connection closes or violates the protocol.
    async fn run_connection(&self, entry: Arc<ConnectionEntry>) {
        loop {
            match entry.conn.recv().await {
                Ok(bytes) => {
                    if let Err(error) = self.handle_frame(&entry, &bytes).await {
                        warn!(id = %entry.id, error = %error, "frame validation failed");
                        let _ = entry.conn.close(CLOSE_PROTOCOL, &error.to_string()).await;
                        break;
                    }
                }
                Err(error) => {
                    debug!(id = %entry.id, error = %error, "connection closed");
                    break;
                }
            }
        }

        // Rejected connections never register, so remove() returning None
        // also means the close handler must not fire.
        if let Some(entry) = self.inner.registry.remove(&entry.id).await {
            info!(id = %entry.id, "connection closed");
            if let Some(close) = &self.inner.behaviour.close {
                close(entry.info());
            }
        }
    }

    async fn handle_frame(
        &self,
        entry: &Arc<ConnectionEntry>,
        bytes: &[u8],
    ) -> Result<(), ProtocolError> {
        let watermark = entry.last_seen_correlation.load(Ordering::Acquire);
        let Some(frame) = decode_frame(bytes, Some(watermark))? else {
            return Ok(());
        };

        // Calls carry the event name in the label; the shared decoder only
        // validates it on uncorrelated frames.
        let correlated = frame.is_correlated();
        let event = match frame.label {
            Some(label) if is_valid_label(&label) => label,
            _ => return Err(ProtocolError::InvalidLabel),
        };

        if !correlated {
            if let Some(handler) = &self.inner.behaviour.message {
                let ctx =
                    MessageContext::new(entry.info(), event, frame.payload, Responder::new());
                let outcome = handler(ctx);
                // Fire-and-forget: nobody is waiting for a reply.
                tokio::spawn(async move {
                    let _ = outcome.await;
                });
            }
            return Ok(());
        }

        entry
            .last_seen_correlation
            .store(frame.correlation_id, Ordering::Release);

        let responder = Responder::new();
        let returned = match &self.inner.behaviour.message {
            Some(handler) => {
                let ctx = MessageContext::new(
                    entry.info(),
                    event,
                    frame.payload,
                    responder.clone(),
                );
                handler(ctx).await
            }
            None => Ok(None),
        };
        let outcome = responder.settle(returned);

        // The handler may have outlived the connection; replies only go
        // to still-registered connections.
        if !self.inner.registry.contains(&entry.id).await {
            return Ok(());
        }

        let reply = match outcome {
            Ok(payload) => Frame::reply(frame.correlation_id, payload),
            Err(error) => Frame::failure(frame.correlation_id, error.message),
        };
        match encode_frame(&reply) {
            Ok(bytes) => {
                if let Err(error) = entry.conn.send(Bytes::from(bytes)).await {
                    debug!(id = %entry.id, error = %error, "reply dropped");
                }
            }
            Err(error) => {
                warn!(id = %entry.id, error = %error, "failed to encode reply");
            }
        }
        Ok(())
    }
}
