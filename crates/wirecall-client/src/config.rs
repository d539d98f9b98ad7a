//! Client session configuration.

use std::time::Duration;

/// Reconnection policy for a client session.
///
/// Delays grow exponentially: attempt `n` (1-based) waits
/// `initial_interval * decay^n`, capped at `max_interval`.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Whether lost connections are re-established at all.
    pub enabled: bool,
    /// Base delay between attempts.
    pub initial_interval: Duration,
    /// Upper bound on the delay.
    pub max_interval: Duration,
    /// Exponential growth factor.
    pub decay: f64,
    /// Give up after this many attempts; 0 means unlimited.
    pub max_attempts: u32,
    /// How long a reconnection attempt may take to reach open before it
    /// is abandoned.
    pub handshake_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(30000),
            decay: 1.5,
            max_attempts: 0,
            handshake_timeout: Duration::from_millis(2000),
        }
    }
}

impl ReconnectConfig {
    /// Builder: enable or disable reconnection.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: set the base delay.
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Builder: set the delay cap.
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Builder: set the growth factor.
    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Builder: cap the number of attempts (0 = unlimited).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Builder: set the handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Delay before reconnection attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_interval.as_secs_f64();
        let delay = base * self.decay.powi(attempt as i32);
        let max = self.max_interval.as_secs_f64();
        Duration::from_secs_f64(delay.min(max))
    }
}

/// Configuration for a client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address handed to the connector.
    pub url: String,
    /// Credentials presented at connect time; travel as the negotiated
    /// protocol.
    pub credentials: Option<String>,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Creates a configuration for the given address.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Builder: set the credentials.
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Builder: set the reconnection policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}
