//! # liveline - MCP server for Ableton Live
//!
//! Drives a running Live set through the AbletonOSC remote script.
//!
//! ## Architecture
//!
//! liveline is an umbrella crate that coordinates:
//! - **liveline-osc** - OSC over UDP: codec, request/response correlation,
//!   connection gatekeeping
//! - **liveline-samples** - Sample library scanning, indexing and search
//! - **liveline-tools** - MCP tool definitions and handlers
//!
//! and provides the stdio JSON-RPC [`server`] that the `liveline` binary runs.
//!
//! ## Quick Start
//!
//! ```ignore
//! use liveline::prelude::*;
//!
//! let session = Arc::new(OscSession::new(SessionConfig::new(OscConfig::from_env())));
//! let ctx = ToolContext::new(session, Arc::new(SampleLibrary::default()));
//! let server = Server::new(ToolRegistry::new(Arc::new(ctx)));
//! server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
//! ```

pub mod error;
pub mod server;

pub use error::{Error, Result};
pub use server::Server;

/// Re-export of liveline-osc
pub use liveline_osc as osc;

/// Re-export of liveline-samples
pub use liveline_samples as samples;

/// Re-export of liveline-tools
pub use liveline_tools as tools;

pub use liveline_osc::{OscClient, OscConfig, OscSession, SessionConfig, Timeouts, Value};
pub use liveline_samples::SampleLibrary;
pub use liveline_tools::{ToolContext, ToolRegistry, ToolResult};

pub mod prelude {
    pub use crate::server::Server;
    pub use crate::{Error, Result};
    pub use liveline_osc::{OscConfig, OscSession, SessionConfig, Timeouts};
    pub use liveline_samples::SampleLibrary;
    pub use liveline_tools::{ToolContext, ToolRegistry, ToolResult};
    pub use std::sync::Arc;
}
