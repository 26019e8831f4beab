//! MCP tool handlers that drive Ableton Live through AbletonOSC.
//!
//! Every tool takes JSON arguments and produces a [`ToolResult`]: either a
//! compact JSON snapshot of the state it touched, or error text starting with
//! the tool area's code (`MIXER_ERROR: ...`).
//!
//! ```ignore
//! use liveline_tools::{ToolContext, ToolRegistry};
//!
//! let registry = ToolRegistry::new(Arc::new(ToolContext::new(session, samples)));
//! let result = registry.call("transport_get_tempo", &json!({})).await;
//! ```

pub mod context;
pub mod convert;
pub mod error;
pub mod live;
pub mod notes;
pub mod registry;
pub mod result;
pub mod snapshot;
pub mod tools;

pub use context::ToolContext;
pub use error::{Result, ToolError};
pub use live::Live;
pub use registry::ToolRegistry;
pub use result::{Content, ToolDefinition, ToolResult};
