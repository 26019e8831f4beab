//! Error types for the OSC client

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OscError {
    #[error("OSC client not ready. Call open() first.")]
    NotReady,

    #[error("OSC query timeout after {timeout_ms}ms for address: {address}")]
    Timeout { address: String, timeout_ms: u64 },

    #[error("Client closing")]
    Closing,

    #[error("Failed to bind OSC receive socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to send OSC message to {address}: {source}")]
    Send {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("OSC codec error: {0}")]
    Codec(String),

    #[error(
        "AbletonOSC health check failed. Troubleshooting steps:\n\
         1. Ensure Ableton Live 12 is running\n\
         2. Check that AbletonOSC is installed and enabled\n\
         3. Verify OSC ports: send={send_port}, receive={receive_port}\n\
         4. Check firewall settings for UDP port {receive_port}"
    )]
    Connection {
        host: String,
        send_port: u16,
        receive_port: u16,
    },

    #[error(
        "Lost connection to AbletonOSC at {host} after {attempts} reconnect attempts.\n\
         - Check that Ableton Live is running with AbletonOSC enabled\n\
         - Check that nothing else holds UDP port {receive_port}\n\
         - Verify OSC ports: send={send_port}, receive={receive_port}"
    )]
    ConnectionLost {
        attempts: u32,
        host: String,
        send_port: u16,
        receive_port: u16,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl OscError {
    /// True when the local receive port is held by another socket.
    pub fn is_port_in_use(&self) -> bool {
        match self {
            OscError::Bind { source, .. } | OscError::Io(source) => {
                source.kind() == io::ErrorKind::AddrInUse
            }
            other => {
                let message = other.to_string();
                message.contains("EADDRINUSE") || message.contains("address already in use")
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OscError::Timeout { .. })
            || self.to_string().to_lowercase().contains("timeout")
    }
}

/// `io::Error` is not `Clone`; copies keep its kind and message but drop the
/// inner source.
impl Clone for OscError {
    fn clone(&self) -> Self {
        let copy_io = |e: &io::Error| io::Error::new(e.kind(), e.to_string());
        match self {
            OscError::NotReady => OscError::NotReady,
            OscError::Timeout {
                address,
                timeout_ms,
            } => OscError::Timeout {
                address: address.clone(),
                timeout_ms: *timeout_ms,
            },
            OscError::Closing => OscError::Closing,
            OscError::Bind { addr, source } => OscError::Bind {
                addr: addr.clone(),
                source: copy_io(source),
            },
            OscError::Send { address, source } => OscError::Send {
                address: address.clone(),
                source: copy_io(source),
            },
            OscError::Codec(message) => OscError::Codec(message.clone()),
            OscError::Connection {
                host,
                send_port,
                receive_port,
            } => OscError::Connection {
                host: host.clone(),
                send_port: *send_port,
                receive_port: *receive_port,
            },
            OscError::ConnectionLost {
                attempts,
                host,
                send_port,
                receive_port,
            } => OscError::ConnectionLost {
                attempts: *attempts,
                host: host.clone(),
                send_port: *send_port,
                receive_port: *receive_port,
            },
            OscError::Io(source) => OscError::Io(copy_io(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, OscError>;

/// Machine-readable failure kind reported by `OscClient::classify_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotReady,
    Timeout,
    PortInUse,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotReady => "PORT_NOT_READY",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::PortInUse => "PORT_IN_USE",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
}
