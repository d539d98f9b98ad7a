//! Initiating-side session for the wirecall protocol.
//!
//! A [`SocketClient`] maintains one logical session across possibly many
//! physical connections: it multiplexes concurrent correlated calls over
//! a single transport connection, dispatches uncorrelated events to
//! subscribers, and recovers from transport loss with exponential backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use wirecall_client::{ClientConfig, ReconnectConfig, SocketClient};
//! use wirecall_transport::stream::TcpConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("tcp://127.0.0.1:9000")
//!         .with_credentials("secret-token")
//!         .with_reconnect(ReconnectConfig::default().with_enabled(true));
//!
//!     let client = SocketClient::connect(config, TcpConnector);
//!     client.wait_until_open().await?;
//!
//!     let pong = client.call("ping", None).await?;
//!     println!("{pong:?}");
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod socket;

pub use config::{ClientConfig, ReconnectConfig};
pub use error::{ClientError, ClientResult};
pub use socket::{SessionState, SocketClient};
