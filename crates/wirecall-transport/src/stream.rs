//! Length-prefixed stream transport.
//!
//! Carries whole frames over any byte stream with a 4-byte big-endian
//! length prefix:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  frame payload   |
//! +----------------+------------------+
//! ```
//!
//! The prefix's high bit marks a close frame, whose payload is a 2-byte
//! close code followed by the reason text. The first frame in each
//! direction is the handshake: the connector sends its JSON
//! [`HandshakeHeaders`], the acceptor echoes them back once the upgrade
//! completes.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{TransportError, TransportResult};
use crate::{CLOSE_ABNORMAL, Connection, Connector, HandshakeHeaders, Listener, UpgradeRequest};

/// Maximum frame size (1 MiB).
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// High bit of the length prefix marks a close frame.
const CONTROL_BIT: u32 = 1 << 31;

/// How long the acceptor waits for the connector's hello.
const DEFAULT_HELLO_TIMEOUT: Duration = Duration::from_secs(2);

/// A [`Connection`] over any byte stream.
pub struct StreamConnection<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    closed: std::sync::Mutex<Option<(u16, String)>>,
}

impl<S> fmt::Debug for StreamConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection").finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> StreamConnection<S> {
    /// Wraps a byte stream in frame-at-a-time send/recv.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: std::sync::Mutex::new(None),
        }
    }

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
impl<S: AsyncRead + AsyncWrite + Send + 'static> Connection for StreamConnection<S> {
    async fn send(&self, payload: Bytes) -> TransportResult<()> {
        if let Some(error) = self.closed_error() {
            return Err(error);
        }

        let len = payload.len() as u32;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> TransportResult<Bytes> {
        if let Some(error) = self.closed_error() {
            return Err(error);
        }

        let mut reader = self.reader.lock().await;

        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.mark_closed(CLOSE_ABNORMAL, "");
                return Err(self
                    .closed_error()
                    .unwrap_or_else(|| TransportError::closed(CLOSE_ABNORMAL, "")));
            }
            Err(e) => return Err(e.into()),
        }
        let prefix = u32::from_be_bytes(len_buf);

        if prefix & CONTROL_BIT != 0 {
            let len = (prefix & !CONTROL_BIT) as usize;
            if len < 2 || len > MAX_FRAME_SIZE as usize {
                self.mark_closed(CLOSE_ABNORMAL, "");
                return Err(TransportError::closed(CLOSE_ABNORMAL, ""));
            }
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload).await?;
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
            self.mark_closed(code, &reason);
            return Err(TransportError::closed(code, reason));
        }

        if prefix > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: prefix,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut payload = vec![0u8; prefix as usize];
        reader.read_exact(&mut payload).await?;
        Ok(Bytes::from(payload))
    }

    async fn close(&self, code: u16, reason: &str) -> TransportResult<()> {
        self.mark_closed(code, reason);

        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());

        let mut writer = self.writer.lock().await;
        let prefix = payload.len() as u32 | CONTROL_BIT;
        // The peer may already be gone; closing is best-effort.
        let _ = writer.write_all(&prefix.to_be_bytes()).await;
        let _ = writer.write_all(&payload).await;
        let _ = writer.flush().await;
        let _ = writer.shutdown().await;
        Ok(())
    }
}

/// Connects over TCP to `tcp://host:port` addresses.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        url: &str,
        credentials: Option<&str>,
    ) -> TransportResult<Box<dyn Connection>> {
        let parsed =
            Url::parse(url).map_err(|e| TransportError::InvalidAddress(format!("{url}: {e}")))?;
        if parsed.scheme() != "tcp" {
            return Err(TransportError::InvalidAddress(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::InvalidAddress(format!("{url}: missing host")))?;
        let port = parsed
            .port()
            .ok_or_else(|| TransportError::InvalidAddress(format!("{url}: missing port")))?;

        debug!(host, port, "connecting stream transport");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let conn = StreamConnection::new(stream);

        let hello = HandshakeHeaders {
            key: Uuid::new_v4().simple().to_string(),
            protocol: credentials.unwrap_or_default().to_string(),
            extensions: String::new(),
        };
        let payload =
            serde_json::to_vec(&hello).map_err(|e| TransportError::Handshake(e.to_string()))?;
        conn.send(Bytes::from(payload)).await?;

        // The acceptor echoes the handshake once the upgrade completes.
        conn.recv().await?;

        Ok(Box::new(conn))
    }
}

/// Accepts TCP connections and turns them into upgrade requests.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
    hello_timeout: Duration,
}

impl TcpAcceptor {
    /// Binds to the given address (e.g. `127.0.0.1:0`).
    pub async fn bind(addr: &str) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            hello_timeout: DEFAULT_HELLO_TIMEOUT,
        })
    }

    /// Builder: how long to wait for a connector's hello frame.
    pub fn with_hello_timeout(mut self, timeout: Duration) -> Self {
        self.hello_timeout = timeout;
        self
    }

    /// The bound local address.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl Listener for TcpAcceptor {
    async fn accept(&self) -> TransportResult<Box<dyn UpgradeRequest>> {
        let (stream, peer) = self.listener.accept().await?;
        debug!(peer = %peer, "inbound stream connection");

        let conn = StreamConnection::new(stream);
        let hello = tokio::time::timeout(self.hello_timeout, conn.recv())
            .await
            .map_err(|_| TransportError::Handshake("timed out waiting for hello".to_string()))??;
        let handshake: HandshakeHeaders = serde_json::from_slice(&hello)
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        Ok(Box::new(StreamUpgrade { handshake, conn }))
    }
}

/// An inbound stream connection that has sent its hello.
pub struct StreamUpgrade {
    handshake: HandshakeHeaders,
    conn: StreamConnection<TcpStream>,
}

#[async_trait]
impl UpgradeRequest for StreamUpgrade {
    fn handshake(&self) -> &HandshakeHeaders {
        &self.handshake
    }

    /// Byte streams carry no abort signal ahead of the upgrade.
    fn is_aborted(&self) -> bool {
        false
    }

    async fn accept(self: Box<Self>) -> TransportResult<Box<dyn Connection>> {
        let ack = serde_json::to_vec(&self.handshake)
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        self.conn.send(Bytes::from(ack)).await?;
        Ok(Box::new(self.conn))
    }
}
