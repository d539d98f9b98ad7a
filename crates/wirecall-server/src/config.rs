//! Server configuration.

use std::time::Duration;

/// Configuration for the acceptor.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How often the keep-alive heartbeat is broadcast.
    pub keepalive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_millis(3000),
        }
    }
}

impl ServerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the keep-alive interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}
