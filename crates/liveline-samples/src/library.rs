//! Shared handle to the sample index on disk.

use crate::error::Result;
use crate::index::SampleIndex;
use crate::scanner::{self, ScanOptions, ScanReport};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_INDEX_PATH: &str = "data/sample-index.json";

/// Owns the index location and guarantees at most one scan at a time.
#[derive(Debug)]
pub struct SampleLibrary {
    index_path: PathBuf,
    scanning: AtomicBool,
}

/// Clears the scanning flag on every exit path.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SampleLibrary {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Fresh view of the index as currently saved.
    pub fn load_index(&self) -> SampleIndex {
        SampleIndex::load(&self.index_path)
    }

    /// Blocking; run on a blocking thread from async code.
    ///
    /// Returns an `already_scanning` report instead of waiting when another
    /// scan holds the library.
    pub fn scan(&self, roots: &[PathBuf], force: bool) -> Result<ScanReport> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(ScanReport::already_scanning());
        }
        let _guard = ScanGuard(&self.scanning);

        scanner::scan(
            roots,
            &ScanOptions {
                force,
                index_path: self.index_path.clone(),
            },
        )
    }
}

impl Default for SampleLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_PATH)
    }
}
