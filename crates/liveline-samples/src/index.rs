//! On-disk sample index.
//!
//! A flat JSON array of [`SampleEntry`] records, unique by absolute path.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// One indexed audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub path: String,
    pub relative_path: String,
    pub filename: String,
    /// Lowercase, with leading dot.
    pub extension: String,
    pub duration_ms: Option<u64>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u16>,
    pub channels: Option<u16>,
    pub codec: Option<String>,
    pub bpm: Option<u32>,
    pub key: Option<String>,
    pub instrument_type: Option<String>,
    #[serde(default)]
    pub character_tags: Vec<String>,
    pub file_size: u64,
    pub mtime_ms: i64,
    pub scan_root: String,
}

/// Search filters, combined with AND. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleQuery {
    pub instrument_type: Option<String>,
    pub key: Option<String>,
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
    /// Case-insensitive substring of filename or path.
    pub text: Option<String>,
    /// Character tag, case-insensitive.
    pub character: Option<String>,
    /// Extension with or without the dot.
    pub format: Option<String>,
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
    pub limit: Option<usize>,
}

impl SampleQuery {
    fn matches(&self, entry: &SampleEntry) -> bool {
        if let Some(kind) = &self.instrument_type {
            if entry.instrument_type.as_ref() != Some(kind) {
                return false;
            }
        }
        if let Some(key) = &self.key {
            if entry.key.as_ref() != Some(key) {
                return false;
            }
        }

        let bpm = entry.bpm.map(f64::from);
        if !within(bpm, self.bpm_min, self.bpm_max) {
            return false;
        }

        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !entry.filename.to_lowercase().contains(&needle)
                && !entry.path.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if let Some(format) = &self.format {
            let format = format.to_lowercase();
            let ext = if format.starts_with('.') {
                format
            } else {
                format!(".{}", format)
            };
            if entry.extension != ext {
                return false;
            }
        }

        if let Some(character) = &self.character {
            let wanted = character.to_lowercase();
            if !entry
                .character_tags
                .iter()
                .any(|t| t.to_lowercase() == wanted)
            {
                return false;
            }
        }

        let duration = entry.duration_ms.map(|d| d as f64);
        within(duration, self.min_duration_ms, self.max_duration_ms)
    }
}

/// Bounds are inclusive; an entry without a value fails any bound.
fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    match value {
        Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
        None => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_samples: usize,
    pub by_instrument_type: BTreeMap<String, usize>,
    pub by_format: BTreeMap<String, usize>,
    pub by_scan_root: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SampleIndex {
    entries: Vec<SampleEntry>,
    by_path: HashMap<String, usize>,
}

impl SampleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing or unreadable file yields an empty index.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let entries = match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<Vec<SampleEntry>>(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt sample index");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read sample index");
                Vec::new()
            }
        };
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<SampleEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.upsert(entry);
        }
        index
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Insert, or replace the entry with the same path in place.
    pub fn upsert(&mut self, entry: SampleEntry) {
        match self.by_path.get(&entry.path) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.by_path.insert(entry.path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<SampleEntry> {
        let idx = self.by_path.remove(path)?;
        let removed = self.entries.remove(idx);
        for slot in self.by_path.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, path: &str) -> Option<&SampleEntry> {
        self.by_path.get(path).map(|&idx| &self.entries[idx])
    }

    /// Like [`get`](Self::get), but a miss is an error.
    pub fn require(&self, path: &str) -> Result<&SampleEntry> {
        self.get(path)
            .ok_or_else(|| Error::SampleNotFound(path.to_string()))
    }

    pub fn entries(&self) -> &[SampleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_path.clear();
    }

    /// Entries matching every filter, in index order, up to the limit.
    pub fn search(&self, query: &SampleQuery) -> Vec<&SampleEntry> {
        let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        self.entries
            .iter()
            .filter(|entry| query.matches(entry))
            .take(limit)
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            total_samples: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            if let Some(kind) = &entry.instrument_type {
                *stats.by_instrument_type.entry(kind.clone()).or_default() += 1;
            }
            if !entry.extension.is_empty() {
                *stats.by_format.entry(entry.extension.clone()).or_default() += 1;
            }
            if !entry.scan_root.is_empty() {
                *stats.by_scan_root.entry(entry.scan_root.clone()).or_default() += 1;
            }
        }
        stats
    }
}
