//! Sample library tools. These touch the disk only, never Live.

use super::parse_args;
use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::result::{ToolDefinition, ToolResult};
use liveline_samples::{IndexStats, SampleLibrary, SampleQuery, INSTRUMENT_TYPES};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub const ERROR_PREFIX: &str = "SAMPLE_ERROR";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "sample_scan",
            "Scan sample directories and build/update the metadata index. Extracts duration, format, BPM, key, instrument type, and character tags from file metadata and filenames. First scan builds the full index; subsequent scans skip unchanged files (incremental). Use force=true to rescan everything.",
            json!({
                "type": "object",
                "properties": {
                    "directories": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Absolute paths to scan. Example: [\"/home/user/Music/Samples\", \"/home/user/Music/Ableton/User Library/Samples\"]"
                    },
                    "force": {
                        "type": "boolean",
                        "description": "Force full rescan ignoring cache (default false)",
                        "default": false
                    }
                },
                "required": ["directories"]
            }),
        ),
        ToolDefinition::new(
            "sample_search",
            "Search the sample index by instrument type, musical key, BPM range, text query, character/vibe, format, or duration. All filters are optional and combined with AND logic. Returns up to 50 results by default.",
            json!({
                "type": "object",
                "properties": {
                    "instrument_type": {
                        "type": "string",
                        "enum": INSTRUMENT_TYPES,
                        "description": "Filter by instrument classification"
                    },
                    "key": { "type": "string", "description": "Musical key, e.g. \"Cmin\", \"F#maj\", \"Am\"" },
                    "bpm_min": { "type": "number", "description": "Minimum BPM (inclusive)" },
                    "bpm_max": { "type": "number", "description": "Maximum BPM (inclusive)" },
                    "text": { "type": "string", "description": "Substring search in filename and path" },
                    "character": { "type": "string", "description": "Vibe/character tag, e.g. \"punchy\", \"dark\", \"warm\"" },
                    "format": { "type": "string", "description": "File format, e.g. \"wav\", \"aiff\", \"flac\"" },
                    "min_duration_ms": { "type": "number", "description": "Minimum duration in milliseconds" },
                    "max_duration_ms": { "type": "number", "description": "Maximum duration in milliseconds" },
                    "limit": { "type": "integer", "description": "Max results to return (default 50)", "default": 50 }
                },
                "required": []
            }),
        ),
        ToolDefinition::new(
            "sample_get_stats",
            "Get statistics about the current sample index: total count, breakdown by instrument type, format, and scan root directory.",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
        ToolDefinition::new(
            "sample_load",
            "Get the file path for a sample to load into Ableton. Returns the absolute path for manual drag-and-drop into a track.",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Absolute path to the sample file (from search results)" },
                    "track": { "description": "Target track index or name (reserved, currently unused)" }
                },
                "required": ["path"]
            }),
        ),
    ]
}

#[derive(Deserialize)]
struct ScanArgs {
    directories: Vec<String>,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct LoadArgs {
    path: String,
}

#[derive(Debug, Serialize)]
struct ScanState {
    scanning: bool,
}

#[derive(Debug, Serialize)]
struct Stats {
    #[serde(flatten)]
    stats: IndexStats,
    scan_status: ScanState,
}

pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    if !name.starts_with("sample_") {
        return None;
    }
    let outcome = match name {
        "sample_scan" => scan(ctx, args).await,
        "sample_search" => search(ctx, args).await,
        "sample_get_stats" => stats(ctx).await,
        "sample_load" => load(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

/// Run index work on the blocking pool.
async fn blocking<T, F>(ctx: &ToolContext, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&SampleLibrary) -> Result<T> + Send + 'static,
{
    let library = Arc::clone(ctx.samples());
    tokio::task::spawn_blocking(move || work(&library))
        .await
        .map_err(|e| ToolError::Task(e.to_string()))?
}

async fn scan(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: ScanArgs = parse_args(args)?;
    let roots: Vec<PathBuf> = args.directories.iter().map(PathBuf::from).collect();
    tracing::info!(roots = roots.len(), force = args.force, "Sample scan requested");

    let report = blocking(ctx, move |library| Ok(library.scan(&roots, args.force)?)).await?;
    ToolResult::json(&report)
}

async fn search(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let query: SampleQuery = parse_args(args)?;
    blocking(ctx, move |library| {
        let index = library.load_index();
        if index.is_empty() {
            return ToolResult::json(&json!({ "hint": "No samples indexed yet. Run sample_scan first." }));
        }
        let results = index.search(&query);
        ToolResult::json(&json!({ "result_count": results.len(), "results": results }))
    })
    .await
}

async fn stats(ctx: &ToolContext) -> Result<ToolResult> {
    blocking(ctx, |library| {
        ToolResult::json(&Stats {
            stats: library.load_index().stats(),
            scan_status: ScanState {
                scanning: library.is_scanning(),
            },
        })
    })
    .await
}

async fn load(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: LoadArgs = parse_args(args)?;
    blocking(ctx, move |library| {
        let index = library.load_index();
        let entry = index.require(&args.path)?;
        ToolResult::json(&json!({
            "path": entry.path,
            "filename": entry.filename,
            "duration_ms": entry.duration_ms,
            "instrument_type": entry.instrument_type,
            "instructions": format!("Drag this file into the desired Ableton track: {}", entry.path),
        }))
    })
    .await
}
