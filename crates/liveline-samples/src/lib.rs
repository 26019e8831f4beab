//! Sample library indexing.
//!
//! - [`classifier`]: instrument, BPM, key and character tags from file names
//! - [`scanner`]: recursive, incremental directory scans with WAV metadata
//! - [`index`]: the JSON index with search and statistics
//! - [`library`]: shared handle enforcing a single scan at a time

pub mod classifier;
pub mod error;
pub mod index;
pub mod library;
pub mod scanner;

pub use classifier::{classify_path, Classification, INSTRUMENT_TYPES};
pub use error::{Error, Result};
pub use index::{IndexStats, SampleEntry, SampleIndex, SampleQuery, DEFAULT_SEARCH_LIMIT};
pub use library::{SampleLibrary, DEFAULT_INDEX_PATH};
pub use scanner::{scan, ScanOptions, ScanReport, ScanStatus};
