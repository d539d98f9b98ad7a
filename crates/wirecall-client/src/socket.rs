//! Client session: one logical connection across many physical ones.
//!
//! The session owns a background driver task that establishes the
//! transport connection, pumps inbound frames, and runs the backoff
//! reconnection loop after transport loss. Callers interact through the
//! cloneable [`SocketClient`] handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{Mutex, Notify, RwLock, oneshot, watch};
use tracing::{debug, warn};

use wirecall_protocol::{Frame, decode_frame, encode_frame};
use wirecall_transport::{CLOSE_NORMAL, Connection, Connector, TransportError};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Lifecycle states of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The session is usable; calls and sends go through.
    Open,
    /// The caller asked to close; waiting for the transport to confirm.
    Closing,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
    /// The connection is gone and no further attempts will be made.
    /// Reached on transport loss with reconnection disabled or exhausted.
    Lost,
    /// Closed by the caller. Terminal.
    Closed,
}

/// Inbound event names that collide with lifecycle notifications; the
/// original client drops them rather than letting a peer spoof lifecycle.
const RESERVED_EVENTS: [&str; 3] = ["open", "close", "error"];

type ReplyOutcome = ClientResult<Option<Value>>;
type EventCallback = Arc<dyn Fn(Option<Value>) + Send + Sync>;
type MessageCallback = Arc<dyn Fn(&str, Option<Value>) + Send + Sync>;

/// Outstanding correlated calls.
///
/// The id counter lives with the table so that allocating an id and
/// registering the pending call are one critical section. Entries leave
/// through exactly two doors: a matching reply, or the flush on
/// connection loss.
struct CallTable {
    next_id: u64,
    entries: HashMap<u64, oneshot::Sender<ReplyOutcome>>,
}

impl CallTable {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: HashMap::new(),
        }
    }

    fn register(&mut self) -> (u64, oneshot::Receiver<ReplyOutcome>) {
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.entries.insert(self.next_id, tx);
        (self.next_id, rx)
    }

    fn complete(&mut self, id: u64) -> Option<oneshot::Sender<ReplyOutcome>> {
        self.entries.remove(&id)
    }

    fn abandon(&mut self, id: u64) {
        self.entries.remove(&id);
    }

    /// Drains every pending call and resets the correlation counter.
    fn flush(&mut self) -> Vec<oneshot::Sender<ReplyOutcome>> {
        self.next_id = 0;
        self.entries.drain().map(|(_, tx)| tx).collect()
    }
}

struct SessionShared {
    config: ClientConfig,
    calls: Mutex<CallTable>,
    conn: RwLock<Option<Arc<dyn Connection>>>,
    state_tx: watch::Sender<SessionState>,
    /// One-shot flag: the next close notification is caller-initiated.
    force_closed: AtomicBool,
    close_notify: Notify,
    subscribers: std::sync::RwLock<HashMap<String, Vec<EventCallback>>>,
    message_handler: std::sync::RwLock<Option<MessageCallback>>,
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    /// Consumes the force-closed flag; true at most once per `close()`.
    fn take_force_closed(&self) -> bool {
        self.force_closed.swap(false, Ordering::SeqCst)
    }

    async fn flush_pending(&self) {
        let pending = self.calls.lock().await.flush();
        for tx in pending {
            let _ = tx.send(Err(ClientError::SocketClosed));
        }
    }

    async fn handle_frame(&self, bytes: &[u8]) {
        let frame = match decode_frame(bytes, None) {
            Ok(Some(frame)) => frame,
            // Empty frames are the keep-alive heartbeat.
            Ok(None) => return,
            Err(error) => {
                warn!(error = %error, "dropping undecodable frame");
                return;
            }
        };

        if frame.is_correlated() {
            let Some(tx) = self.calls.lock().await.complete(frame.correlation_id) else {
                debug!(id = frame.correlation_id, "dropping reply for unknown call");
                return;
            };
            let outcome = match frame.label {
                Some(message) => Err(ClientError::Reply(message)),
                None => Ok(frame.payload),
            };
            let _ = tx.send(outcome);
            return;
        }

        let Some(event) = frame.label else { return };
        if RESERVED_EVENTS.contains(&event.as_str()) {
            return;
        }

        // The designated handler takes precedence over subscriptions;
        // it is an override, not an additional delivery.
        let handler = self
            .message_handler
            .read()
            .expect("message handler lock")
            .clone();
        if let Some(handler) = handler {
            handler(&event, frame.payload);
            return;
        }

        let callbacks = self
            .subscribers
            .read()
            .expect("subscriber lock")
            .get(&event)
            .cloned()
            .unwrap_or_default();
        for callback in &callbacks {
            callback(frame.payload.clone());
        }
    }
}

/// Handle to a client session.
///
/// Cloning is cheap; all clones share the same session.
#[derive(Clone)]
pub struct SocketClient {
    shared: Arc<SessionShared>,
}

impl SocketClient {
    /// Starts a session. Connecting happens in the background; use
    /// [`wait_until_open`](Self::wait_until_open) or
    /// [`state_watch`](Self::state_watch) to observe progress.
    pub fn connect(config: ClientConfig, connector: impl Connector) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Connecting);
        let shared = Arc::new(SessionShared {
            config,
            calls: Mutex::new(CallTable::new()),
            conn: RwLock::new(None),
            state_tx,
            force_closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            subscribers: std::sync::RwLock::new(HashMap::new()),
            message_handler: std::sync::RwLock::new(None),
        });

        tokio::spawn(drive(shared.clone(), Arc::new(connector)));

        Self { shared }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    /// A watch channel following state transitions.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Waits until the session is open.
    ///
    /// Fails with [`ClientError::SocketClosed`] if the session reaches a
    /// terminal state first.
    pub async fn wait_until_open(&self) -> ClientResult<()> {
        let mut state_rx = self.shared.state_tx.subscribe();
        loop {
            match *state_rx.borrow_and_update() {
                SessionState::Open => return Ok(()),
                SessionState::Lost | SessionState::Closed => {
                    return Err(ClientError::SocketClosed);
                }
                _ => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(ClientError::SocketClosed);
            }
        }
    }

    /// Sends a correlated call and waits for the reply.
    ///
    /// Fails fast with [`ClientError::NotConnected`] while the session is
    /// not open; calls are never queued across reconnects. A failure
    /// reply surfaces as [`ClientError::Reply`]; losing the connection
    /// while the call is outstanding surfaces as
    /// [`ClientError::SocketClosed`].
    pub async fn call(&self, event: &str, payload: Option<Value>) -> ClientResult<Option<Value>> {
        let conn = self.open_connection().await?;

        let (id, reply_rx) = self.shared.calls.lock().await.register();
        let bytes = match encode_frame(&Frame::call(id, event, payload)) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.shared.calls.lock().await.abandon(id);
                return Err(error.into());
            }
        };
        if let Err(error) = conn.send(Bytes::from(bytes)).await {
            self.shared.calls.lock().await.abandon(id);
            return Err(error.into());
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::SocketClosed),
        }
    }

    /// Sends an uncorrelated event, fire-and-forget.
    ///
    /// Fails fast with [`ClientError::NotConnected`] while the session is
    /// not open; events are never queued.
    pub async fn send(&self, event: &str, payload: Option<Value>) -> ClientResult<()> {
        let conn = self.open_connection().await?;
        let bytes = encode_frame(&Frame::event(event, payload))?;
        conn.send(Bytes::from(bytes)).await?;
        Ok(())
    }

    /// Subscribes a callback to an inbound event name.
    pub fn on(&self, event: &str, callback: impl Fn(Option<Value>) + Send + Sync + 'static) {
        self.shared
            .subscribers
            .write()
            .expect("subscriber lock")
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(callback));
    }

    /// Installs the designated message handler.
    ///
    /// While installed it receives every inbound event instead of the
    /// `on` subscriptions.
    pub fn set_message_handler(
        &self,
        handler: impl Fn(&str, Option<Value>) + Send + Sync + 'static,
    ) {
        *self
            .shared
            .message_handler
            .write()
            .expect("message handler lock") = Some(Arc::new(handler));
    }

    /// Removes the designated message handler, restoring subscription
    /// delivery.
    pub fn clear_message_handler(&self) {
        *self
            .shared
            .message_handler
            .write()
            .expect("message handler lock") = None;
    }

    /// Closes the session.
    ///
    /// Pending calls fail with [`ClientError::SocketClosed`]; a
    /// caller-initiated close never triggers reconnection.
    pub async fn close(&self) {
        match self.state() {
            SessionState::Closed => return,
            SessionState::Lost => {
                self.shared.set_state(SessionState::Closed);
                return;
            }
            _ => {}
        }

        debug!("closing session");
        self.shared.force_closed.store(true, Ordering::SeqCst);
        self.shared.set_state(SessionState::Closing);
        self.shared.close_notify.notify_waiters();

        let conn = self.shared.conn.read().await.clone();
        if let Some(conn) = conn {
            let _ = conn.close(CLOSE_NORMAL, "client closed").await;
        }
    }

    async fn open_connection(&self) -> ClientResult<Arc<dyn Connection>> {
        if self.state() != SessionState::Open {
            return Err(ClientError::NotConnected);
        }
        self.shared
            .conn
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)
    }
}

/// Background driver: connect, pump, and reconnect with backoff.
async fn drive(shared: Arc<SessionShared>, connector: Arc<dyn Connector>) {
    let mut attempt: u32 = 0;
    loop {
        if shared.take_force_closed() {
            shared.set_state(SessionState::Closed);
            return;
        }

        shared.set_state(SessionState::Connecting);
        debug!(url = %shared.config.url, "attempting new connection");

        let connecting = connector.connect(&shared.config.url, shared.config.credentials.as_deref());
        let connected = if attempt == 0 {
            connecting.await
        } else {
            // Reconnection attempts must reach open within the handshake
            // timeout; abandoning the future drops the half-open socket.
            match tokio::time::timeout(shared.config.reconnect.handshake_timeout, connecting).await
            {
                Ok(result) => result,
                Err(_) => {
                    debug!("failed to establish connection in time");
                    Err(TransportError::Connect("handshake timed out".to_string()))
                }
            }
        };

        match connected {
            Ok(conn) => {
                let conn: Arc<dyn Connection> = Arc::from(conn);
                // A close issued mid-connect beats the connection to open.
                if shared.take_force_closed() {
                    let _ = conn.close(CLOSE_NORMAL, "client closed").await;
                    shared.set_state(SessionState::Closed);
                    return;
                }
                *shared.conn.write().await = Some(conn.clone());
                attempt = 0;
                shared.set_state(SessionState::Open);
                debug!("connection established");

                pump(&shared, conn.as_ref()).await;

                *shared.conn.write().await = None;
                shared.flush_pending().await;
                debug!("connection lost");
            }
            Err(error) => {
                debug!(error = %error, "connection attempt failed");
            }
        }

        if shared.take_force_closed() {
            shared.set_state(SessionState::Closed);
            return;
        }
        if !shared.config.reconnect.enabled {
            shared.set_state(SessionState::Lost);
            return;
        }

        attempt += 1;
        let max_attempts = shared.config.reconnect.max_attempts;
        if max_attempts != 0 && attempt == max_attempts {
            debug!(max_attempts, "maximum reconnection attempts reached");
            shared.set_state(SessionState::Lost);
            return;
        }

        let delay = shared.config.reconnect.delay_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnection");
        shared.set_state(SessionState::Reconnecting);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shared.close_notify.notified() => {}
        }
    }
}

/// Reads frames until the connection closes.
async fn pump(shared: &Arc<SessionShared>, conn: &dyn Connection) {
    loop {
        match conn.recv().await {
            Ok(bytes) => shared.handle_frame(&bytes).await,
            Err(error) => {
                debug!(error = %error, "connection closed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use serde_json::json;
    use wirecall_transport::memory::{self, MemoryListener};
    use wirecall_transport::{Listener, UpgradeRequest};

    use crate::config::ReconnectConfig;

    /// Completes the next upgrade and returns the acceptor-side connection.
    async fn accept_raw(listener: &MemoryListener) -> Box<dyn Connection> {
        let upgrade = listener.accept().await.unwrap();
        upgrade.accept().await.unwrap()
    }

    fn config() -> ClientConfig {
        ClientConfig::new("memory://test")
    }

    #[tokio::test]
    async fn call_resolves_with_matching_reply() {
        let (connector, listener) = memory::listener();
        let client = SocketClient::connect(config(), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let peer_task = tokio::spawn(async move {
            let bytes = peer.recv().await.unwrap();
            assert_eq!(&bytes[..], br#"1["ping",{"n":1}]"#);
            peer.send(Bytes::from_static(br#"1[null,{"n":2}]"#))
                .await
                .unwrap();
        });

        let reply = client.call("ping", Some(json!({"n": 1}))).await.unwrap();
        assert_eq!(reply, Some(json!({"n": 2})));
        peer_task.await.unwrap();
    }

    #[tokio::test]
    async fn failure_reply_surfaces_as_reply_error() {
        let (connector, listener) = memory::listener();
        let client = SocketClient::connect(config(), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        tokio::spawn(async move {
            let _ = peer.recv().await.unwrap();
            peer.send(Bytes::from_static(br#"1["nope",null]"#))
                .await
                .unwrap();
            // Keep the peer alive until the reply lands.
            let _ = peer.recv().await;
        });

        match client.call("bad", None).await {
            Err(ClientError::Reply(message)) => assert_eq!(message, "nope"),
            other => panic!("expected reply error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_replies_are_dropped_silently() {
        let (connector, listener) = memory::listener();
        let client = SocketClient::connect(config(), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        tokio::spawn(async move {
            let _ = peer.recv().await.unwrap();
            // A reply nobody asked for, then the real one.
            peer.send(Bytes::from_static(br#"99[null,null]"#))
                .await
                .unwrap();
            peer.send(Bytes::from_static(br#"1[null,"real"]"#))
                .await
                .unwrap();
            let _ = peer.recv().await;
        });

        let reply = client.call("ping", None).await.unwrap();
        assert_eq!(reply, Some(json!("real")));
    }

    #[tokio::test]
    async fn events_fan_out_to_subscribers() {
        let (connector, listener) = memory::listener();
        let client = SocketClient::connect(config(), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        client.on("greet", move |payload| {
            event_tx.send(payload).unwrap();
        });

        peer.send(Bytes::from_static(br#"["greet",{"who":"ada"}]"#))
            .await
            .unwrap();

        assert_eq!(event_rx.recv().await.unwrap(), Some(json!({"who": "ada"})));
    }

    #[tokio::test]
    async fn designated_handler_overrides_subscriptions() {
        let (connector, listener) = memory::listener();
        let client = SocketClient::connect(config(), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let subscriber_hits = Arc::new(AtomicUsize::new(0));
        let hits = subscriber_hits.clone();
        client.on("greet", move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        let (handler_tx, mut handler_rx) = tokio::sync::mpsc::unbounded_channel();
        client.set_message_handler(move |event, payload| {
            handler_tx.send((event.to_string(), payload)).unwrap();
        });

        peer.send(Bytes::from_static(br#"["greet",null]"#))
            .await
            .unwrap();

        let (event, payload) = handler_rx.recv().await.unwrap();
        assert_eq!(event, "greet");
        assert_eq!(payload, None);
        assert_eq!(subscriber_hits.load(Ordering::SeqCst), 0);

        // Clearing the handler restores subscription delivery.
        client.clear_message_handler();
        peer.send(Bytes::from_static(br#"["greet",null]"#))
            .await
            .unwrap();
        handler_rx.close();
        while subscriber_hits.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn reserved_lifecycle_events_are_dropped() {
        let (connector, listener) = memory::listener();
        let client = SocketClient::connect(config(), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        for reserved in ["open", "close", "error"] {
            let hits = hits.clone();
            client.on(reserved, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        peer.send(Bytes::from_static(br#"["close",null]"#))
            .await
            .unwrap();
        peer.send(Bytes::from_static(br#"["error",null]"#))
            .await
            .unwrap();
        // A normal event afterwards proves the reserved ones were skipped,
        // not still in flight.
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
        client.on("marker", move |_| {
            seen_tx.send(()).unwrap();
        });
        peer.send(Bytes::from_static(br#"["marker",null]"#))
            .await
            .unwrap();
        seen_rx.recv().await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_fails_pending_calls_and_suppresses_reconnect() {
        let (connector, listener) = memory::listener();
        let reconnect = ReconnectConfig::default().with_enabled(true);
        let client = SocketClient::connect(config().with_reconnect(reconnect), connector);

        let _peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.call("ping", None).await })
        };
        // Let the call register before closing.
        tokio::time::sleep(Duration::from_millis(10)).await;

        client.close().await;

        match pending.await.unwrap() {
            Err(ClientError::SocketClosed) => {}
            other => panic!("expected socket closed, got {other:?}"),
        }

        let mut state_rx = client.state_watch();
        while *state_rx.borrow_and_update() != SessionState::Closed {
            state_rx.changed().await.unwrap();
        }

        // No reconnection attempt follows a caller-initiated close.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn send_while_not_open_fails_fast() {
        let (connector, listener) = memory::listener();
        drop(listener);
        let client = SocketClient::connect(config(), connector);

        let mut state_rx = client.state_watch();
        while *state_rx.borrow_and_update() != SessionState::Lost {
            state_rx.changed().await.unwrap();
        }

        assert!(matches!(
            client.send("ping", None).await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.call("ping", None).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn correlation_counter_restarts_after_reconnect() {
        let (connector, listener) = memory::listener();
        let reconnect = ReconnectConfig::default()
            .with_enabled(true)
            .with_initial_interval(Duration::from_millis(10));
        let client = SocketClient::connect(config().with_reconnect(reconnect), connector);

        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let first_peer = tokio::spawn(async move {
            let bytes = peer.recv().await.unwrap();
            assert!(bytes.starts_with(b"1["));
            peer.send(Bytes::from_static(br#"1[null,null]"#))
                .await
                .unwrap();
            let _ = peer.recv().await;
            peer.close(1001, "going away").await.unwrap();
        });

        client.call("first", None).await.unwrap();
        first_peer.await.unwrap();

        // Drive the reconnect and observe the counter starting over at 1.
        let peer = accept_raw(&listener).await;
        client.wait_until_open().await.unwrap();

        let second_peer = tokio::spawn(async move {
            let bytes = peer.recv().await.unwrap();
            assert!(bytes.starts_with(b"1["));
            peer.send(Bytes::from_static(br#"1[null,null]"#))
                .await
                .unwrap();
            let _ = peer.recv().await;
        });

        client.call("second", None).await.unwrap();
        second_peer.await.unwrap();
    }

    /// Connector that fails a set number of times before delegating to the
    /// in-memory transport.
    struct FlakyConnector {
        inner: memory::MemoryConnector,
        failures_left: Arc<AtomicUsize>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Connector for FlakyConnector {
        async fn connect(
            &self,
            url: &str,
            credentials: Option<&str>,
        ) -> Result<Box<dyn Connection>, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TransportError::Connect("flaky".to_string()));
            }
            self.inner.connect(url, credentials).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_backoff_follows_the_schedule() {
        let (inner, listener) = memory::listener();
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = FlakyConnector {
            inner,
            failures_left: Arc::new(AtomicUsize::new(3)),
            attempts: attempts.clone(),
        };

        tokio::spawn(async move {
            loop {
                let Ok(upgrade) = listener.accept().await else { return };
                let _conn = upgrade.accept().await.unwrap();
                // Keep accepted connections alive.
                std::mem::forget(_conn);
            }
        });

        let started = tokio::time::Instant::now();
        let reconnect = ReconnectConfig::default().with_enabled(true);
        let client = SocketClient::connect(config().with_reconnect(reconnect), connector);
        client.wait_until_open().await.unwrap();

        // Initial attempt plus three backoff attempts: 1500 + 2250 + 3375 ms.
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(7125));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_stops_at_max_attempts() {
        let (inner, listener) = memory::listener();
        drop(listener);
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = FlakyConnector {
            inner,
            failures_left: Arc::new(AtomicUsize::new(usize::MAX)),
            attempts: attempts.clone(),
        };

        let reconnect = ReconnectConfig::default()
            .with_enabled(true)
            .with_max_attempts(3);
        let client = SocketClient::connect(config().with_reconnect(reconnect), connector);

        let mut state_rx = client.state_watch();
        while *state_rx.borrow_and_update() != SessionState::Lost {
            state_rx.changed().await.unwrap();
        }

        // The initial attempt plus reconnect attempts 1 and 2; attempt 3
        // hits the cap before connecting.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(client.state(), SessionState::Lost);
    }
}
