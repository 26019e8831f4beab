//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index file could not be (de)serialized.
    #[error("Index serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// WAV header could not be read.
    #[error("WAV error: {0}")]
    Hound(#[from] hound::Error),

    /// Scan directory missing or unreadable.
    #[error("Cannot scan {path}: {reason}")]
    ScanRoot { path: PathBuf, reason: String },

    /// Sample not present in the index.
    #[error("Sample not found: {0}")]
    SampleNotFound(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
