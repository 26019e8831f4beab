//! Recursive sample directory scanner.
//!
//! Walks each root for audio files, skips files whose modification time
//! matches the index, and extracts metadata in parallel with rayon.

use crate::classifier::classify_path;
use crate::error::{Error, Result};
use crate::index::{SampleEntry, SampleIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "aiff", "aif", "flac", "mp3", "ogg", "m4a"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Re-read every file, ignoring stored modification times.
    pub force: bool,
    pub index_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Complete,
    AlreadyScanning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub scanned: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total: usize,
}

impl ScanReport {
    pub fn already_scanning() -> Self {
        Self {
            status: ScanStatus::AlreadyScanning,
            message: Some("A scan is already in progress".to_string()),
            scanned: 0,
            indexed: 0,
            skipped: 0,
            errors: 0,
            total: 0,
        }
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// All audio files under `root`, sorted.
pub fn collect_audio_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::ScanRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Scan error");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() => stack.push(path),
                Ok(_) if is_audio_file(&path) => files.push(path),
                _ => {}
            }
        }
    }
    files.sort();
    Ok(files)
}

fn mtime_ms(metadata: &std::fs::Metadata) -> Result<i64> {
    let modified = metadata.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(since_epoch.as_millis() as i64)
}

#[derive(Debug, Default, PartialEq)]
struct AudioInfo {
    duration_ms: Option<u64>,
    sample_rate: Option<u32>,
    bit_depth: Option<u16>,
    channels: Option<u16>,
    codec: Option<String>,
}

fn read_wav_info(path: &Path) -> Result<AudioInfo> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let frames = reader.duration() as f64;
    let duration_ms = if spec.sample_rate > 0 {
        Some((frames * 1000.0 / spec.sample_rate as f64).round() as u64)
    } else {
        None
    };
    let codec = match spec.sample_format {
        hound::SampleFormat::Int => "PCM",
        hound::SampleFormat::Float => "IEEE_FLOAT",
    };
    Ok(AudioInfo {
        duration_ms,
        sample_rate: Some(spec.sample_rate),
        bit_depth: Some(spec.bits_per_sample),
        channels: Some(spec.channels),
        codec: Some(codec.to_string()),
    })
}

fn audio_info(path: &Path, extension: &str) -> AudioInfo {
    if extension != ".wav" {
        return AudioInfo::default();
    }
    match read_wav_info(path) {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read WAV header");
            AudioInfo::default()
        }
    }
}

/// Build the index record for one file.
pub fn build_entry(path: &Path, scan_root: &Path) -> Result<SampleEntry> {
    let metadata = std::fs::metadata(path)?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    let relative_path = path
        .strip_prefix(scan_root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();

    let info = audio_info(path, &extension);
    let classification = classify_path(path);

    Ok(SampleEntry {
        path: path.to_string_lossy().into_owned(),
        relative_path,
        filename,
        extension,
        duration_ms: info.duration_ms,
        sample_rate: info.sample_rate,
        bit_depth: info.bit_depth,
        channels: info.channels,
        codec: info.codec,
        bpm: classification.bpm,
        key: classification.key,
        instrument_type: classification.instrument_type,
        character_tags: classification.character_tags,
        file_size: metadata.len(),
        mtime_ms: mtime_ms(&metadata)?,
        scan_root: scan_root.to_string_lossy().into_owned(),
    })
}

/// Scan `roots` into `index` without touching disk state of the index itself.
pub fn scan_into(index: &mut SampleIndex, roots: &[PathBuf], force: bool) -> ScanReport {
    let mut scanned = 0;
    let mut skipped = 0;
    let mut errors = 0;
    let mut indexed = 0;

    for root in roots {
        let files = match collect_audio_files(root) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Scan error");
                Vec::new()
            }
        };

        let mut to_process = Vec::with_capacity(files.len());
        for path in files {
            scanned += 1;
            if !force {
                let current = std::fs::metadata(&path).map_err(Error::from).and_then(|m| mtime_ms(&m));
                match current {
                    Ok(mtime) => {
                        let key = path.to_string_lossy();
                        if index.get(&key).map(|e| e.mtime_ms) == Some(mtime) {
                            skipped += 1;
                            continue;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Scan error");
                        errors += 1;
                        continue;
                    }
                }
            }
            to_process.push(path);
        }

        let results: Vec<(PathBuf, Result<SampleEntry>)> = to_process
            .into_par_iter()
            .map(|path| {
                let entry = build_entry(&path, root);
                (path, entry)
            })
            .collect();

        for (path, result) in results {
            match result {
                Ok(entry) => {
                    index.upsert(entry);
                    indexed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Scan error");
                    errors += 1;
                }
            }
        }
    }

    ScanReport {
        status: ScanStatus::Complete,
        message: None,
        scanned,
        indexed,
        skipped,
        errors,
        total: scanned,
    }
}

/// Load the index, scan `roots` into it, and save it back.
pub fn scan(roots: &[PathBuf], options: &ScanOptions) -> Result<ScanReport> {
    let mut index = SampleIndex::load(&options.index_path);
    let report = scan_into(&mut index, roots, options.force);
    index.save(&options.index_path)?;
    tracing::info!(
        scanned = report.scanned,
        indexed = report.indexed,
        skipped = report.skipped,
        errors = report.errors,
        "Sample scan complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, frames: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * 2 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_collect_filters_extensions_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Drums/Kicks")).unwrap();
        std::fs::write(dir.path().join("Drums/Kicks/kick.WAV"), b"").unwrap();
        std::fs::write(dir.path().join("pad.aif"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let files = collect_audio_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_collect_missing_root_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_audio_files(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_wav_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick_punchy_120bpm.wav");
        write_wav(&path, 44100, 22050);

        let entry = build_entry(&path, dir.path()).unwrap();
        assert_eq!(entry.duration_ms, Some(500));
        assert_eq!(entry.sample_rate, Some(44100));
        assert_eq!(entry.bit_depth, Some(16));
        assert_eq!(entry.channels, Some(2));
        assert_eq!(entry.codec.as_deref(), Some("PCM"));
        assert_eq!(entry.instrument_type.as_deref(), Some("kick"));
        assert_eq!(entry.bpm, Some(120));
        assert_eq!(entry.relative_path, "kick_punchy_120bpm.wav");
        assert_eq!(entry.extension, ".wav");
    }

    #[test]
    fn test_unreadable_wav_keeps_entry_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not a wav").unwrap();

        let entry = build_entry(&path, dir.path()).unwrap();
        assert_eq!(entry.duration_ms, None);
        assert_eq!(entry.file_size, 9);
    }

    #[test]
    fn test_rescan_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("snare_01.wav"), 48000, 480);
        write_wav(&dir.path().join("hat_02.wav"), 48000, 480);
        let roots = vec![dir.path().to_path_buf()];

        let mut index = SampleIndex::new();
        let first = scan_into(&mut index, &roots, false);
        assert_eq!((first.scanned, first.indexed, first.skipped), (2, 2, 0));

        let second = scan_into(&mut index, &roots, false);
        assert_eq!((second.scanned, second.indexed, second.skipped), (2, 0, 2));

        let forced = scan_into(&mut index, &roots, true);
        assert_eq!((forced.indexed, forced.skipped), (2, 0));
        assert_eq!(index.len(), 2);
    }
}
