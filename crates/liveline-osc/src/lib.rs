//! OSC request/response bridge to AbletonOSC.
//!
//! ```text
//! OscSession (gatekeeper: open once, verify once, reconnect)
//!     └── OscClient (per-address single-flight correlation, timeouts)
//!             └── OscTransport (UDP socket, one inbound event channel)
//!                     └── codec (OSC 1.0 messages and bundles)
//! ```
//!
//! ```ignore
//! use liveline_osc::{OscSession, SessionConfig, OscConfig, Timeouts};
//!
//! let session = OscSession::new(SessionConfig::new(OscConfig::from_env()));
//! let client = session.ensure_connected().await?;
//! let tempo = client.query("/live/song/get/tempo", &[], Timeouts::QUERY).await?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;
pub mod value;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{OscClient, HEALTH_CHECK_ADDRESS};
pub use codec::{decode_packet, OscMessage};
pub use config::{OscConfig, SessionConfig, Timeouts};
pub use error::{ErrorClassification, ErrorKind, OscError, Result};
pub use session::{ClientFactory, OscSession, SessionPhase};
pub use transport::{OscTransport, TransportEvent, UdpTransport};
pub use value::{TypedArg, Value};

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTransport;
