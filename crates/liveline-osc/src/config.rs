//! Client and session configuration.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SEND_PORT: u16 = 11001;
pub const DEFAULT_RECEIVE_PORT: u16 = 11000;

/// Per-operation-class default timeouts.
pub struct Timeouts;

impl Timeouts {
    pub const QUERY: Duration = Duration::from_millis(5000);
    pub const COMMAND: Duration = Duration::from_millis(7000);
    pub const LOAD_DEVICE: Duration = Duration::from_millis(10000);
    pub const LOAD_SAMPLE: Duration = Duration::from_millis(10000);
    pub const HEALTH_CHECK: Duration = Duration::from_millis(3000);
}

/// Where the client binds and where it sends.
///
/// `send_port` is the remote peer's listening port, `receive_port` the local
/// port responses arrive on. Both sides use `host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscConfig {
    pub host: String,
    pub send_port: u16,
    pub receive_port: u16,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            send_port: DEFAULT_SEND_PORT,
            receive_port: DEFAULT_RECEIVE_PORT,
        }
    }
}

impl OscConfig {
    /// Read `OSC_HOST`, `OSC_SEND_PORT` and `OSC_RECEIVE_PORT`.
    ///
    /// Missing, empty, or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = |key: &str, fallback: u16| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u16>().ok())
                .filter(|p| *p != 0)
                .unwrap_or(fallback)
        };

        Self {
            host: lookup("OSC_HOST")
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.host),
            send_port: port("OSC_SEND_PORT", defaults.send_port),
            receive_port: port("OSC_RECEIVE_PORT", defaults.receive_port),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_send_port(mut self, port: u16) -> Self {
        self.send_port = port;
        self
    }

    pub fn with_receive_port(mut self, port: u16) -> Self {
        self.receive_port = port;
        self
    }

    pub fn local_addr(&self) -> String {
        format!("{}:{}", self.host, self.receive_port)
    }

    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.host, self.send_port)
    }
}

/// Gatekeeper policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub osc: OscConfig,
    pub max_reconnect_attempts: u32,
    /// Multiplied by the attempt number before each reconnect.
    pub reconnect_backoff: Duration,
    pub health_check_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            osc: OscConfig::default(),
            max_reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(250),
            health_check_timeout: Timeouts::HEALTH_CHECK,
        }
    }
}

impl SessionConfig {
    pub fn new(osc: OscConfig) -> Self {
        Self {
            osc,
            ..Default::default()
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}
