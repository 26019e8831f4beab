//! Centralized error type for the liveline umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("OSC: {0}")]
    Osc(#[from] liveline_osc::OscError),

    #[error("Samples: {0}")]
    Samples(#[from] liveline_samples::Error),

    #[error("Tool: {0}")]
    Tool(#[from] liveline_tools::ToolError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
