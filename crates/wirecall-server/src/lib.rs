//! Accepting-side registry for the wirecall protocol.
//!
//! A [`SocketServer`] owns the set of live connections. Each inbound
//! connection goes through an authenticated upgrade, gets a per-connection
//! anti-replay watermark, and has its frames dispatched to the installed
//! [`Behaviour`] handlers. Correlated calls are answered through the
//! codec; every registered connection receives the keep-alive heartbeat.
//!
//! # Example
//!
//! ```rust,no_run
//! use wirecall_server::{Behaviour, ReplyError, ServerConfig, SocketServer};
//! use wirecall_transport::stream::TcpAcceptor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let behaviour = Behaviour::new().with_message(|ctx| {
//!         Box::pin(async move {
//!             match ctx.event.as_str() {
//!                 "ping" => Ok(ctx.payload),
//!                 _ => Err(ReplyError::new("unknown event")),
//!             }
//!         })
//!     });
//!
//!     let server = SocketServer::new(ServerConfig::default(), behaviour);
//!     let acceptor = TcpAcceptor::bind("127.0.0.1:9000").await?;
//!     server.run(acceptor).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod socket;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{
    AuthRejected, Authenticator, Behaviour, ConnectionInfo, LifecycleHandler, MessageContext,
    MessageHandler, ReplyError, ReplyOutcome, Responder,
};
pub use socket::SocketServer;
