//! Track list, creation, two-step deletion, selection, arming, renaming.

use super::{connect_to_track, no_params, parse_args, track_schema};
use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{count, track_snapshot};
use liveline_osc::Value;
use serde::Deserialize;
use serde_json::json;

pub const ERROR_PREFIX: &str = "TRACK_ERROR";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "track_list",
            "List all tracks with name, type, volume, pan, mute/solo/arm state and device count.",
            no_params(),
        ),
        ToolDefinition::new(
            "track_create",
            "Create a MIDI or audio track. Specify index for position (0-based), or omit to append at end.",
            json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["midi", "audio"], "description": "Track type" },
                    "index": { "type": "integer", "description": "0-based insertion position. Omit or -1 to append at end." }
                },
                "required": ["type"]
            }),
        ),
        ToolDefinition::new(
            "track_delete",
            "Delete a track. First call returns the track's contents for review; call again with confirm=true to delete.",
            track_schema(
                json!({ "confirm": { "type": "boolean", "description": "Set true on the second call to actually delete" } }),
                &["track"],
            ),
        ),
        ToolDefinition::new(
            "track_select",
            "Select a track in Live's UI.",
            track_schema(json!({}), &["track"]),
        ),
        ToolDefinition::new(
            "track_set_arm",
            "Arm or disarm a track for recording.",
            track_schema(
                json!({ "armed": { "type": "boolean", "description": "true to arm, false to disarm" } }),
                &["track", "armed"],
            ),
        ),
        ToolDefinition::new(
            "track_rename",
            "Rename a track.",
            track_schema(
                json!({ "name": { "type": "string", "description": "New track name" } }),
                &["track", "name"],
            ),
        ),
    ]
}

#[derive(Deserialize)]
struct CreateArgs {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    index: Option<i64>,
}

#[derive(Deserialize)]
struct DeleteArgs {
    track: serde_json::Value,
    #[serde(default)]
    confirm: bool,
}

#[derive(Deserialize)]
struct TrackArgs {
    track: serde_json::Value,
}

#[derive(Deserialize)]
struct ArmArgs {
    track: serde_json::Value,
    armed: bool,
}

#[derive(Deserialize)]
struct RenameArgs {
    track: serde_json::Value,
    name: String,
}

pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    if !name.starts_with("track_") {
        return None;
    }
    let outcome = match name {
        "track_list" => list(ctx).await,
        "track_create" => create(ctx, args).await,
        "track_delete" => delete(ctx, args).await,
        "track_select" => select(ctx, args).await,
        "track_set_arm" => set_arm(ctx, args).await,
        "track_rename" => rename(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

async fn list(ctx: &ToolContext) -> Result<ToolResult> {
    let live = ctx.live().await?;
    let track_count = count(&live.get_at("/live/song/get/num_tracks", &[], 0).await?);
    let mut tracks = Vec::with_capacity(track_count as usize);
    for i in 0..track_count {
        tracks.push(track_snapshot(&live, i).await?);
    }
    ToolResult::json(&json!({ "track_count": track_count, "tracks": tracks }))
}

async fn create(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("track_create")?;
    let args: CreateArgs = parse_args(args)?;
    let live = ctx.live().await?;

    let address = if args.kind == "midi" {
        "/live/song/create_midi_track"
    } else {
        "/live/song/create_audio_track"
    };
    let index = args.index.unwrap_or(-1);
    live.command(address, &[Value::Int(index)]).await?;

    let num_tracks = count(&live.get_at("/live/song/get/num_tracks", &[], 0).await?);
    let new_index = if index == -1 { num_tracks - 1 } else { index };
    let snapshot = track_snapshot(&live, new_index).await?;
    ToolResult::json(&json!({ "created": true, "track": snapshot }))
}

/// Without `confirm` only records a snapshot; with it, deletes a track that
/// was reviewed first.
async fn delete(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("track_delete")?;
    let args: DeleteArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;

    if !args.confirm {
        let snapshot = track_snapshot(&live, index).await?;
        ctx.set_pending_delete(index, snapshot.clone());
        return ToolResult::json(&json!({
            "pending_delete": true,
            "warning": "Track will be permanently deleted. Call again with confirm=true to proceed.",
            "track": snapshot,
        }));
    }

    let pending = ctx
        .pending_delete(index)
        .ok_or(ToolError::NoPendingDelete(index))?;
    live.command("/live/song/delete_track", &[Value::Int(index)]).await?;
    ctx.clear_pending_delete(index);
    tracing::info!(track = index, name = %pending.name, "Track deleted");

    ToolResult::json(&json!({
        "deleted": true,
        "track_index": index,
        "track_name": pending.name,
    }))
}

async fn select(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("track_select")?;
    let args: TrackArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    live.command("/live/view/set/selected_track", &[Value::Int(index)]).await?;
    let snapshot = track_snapshot(&live, index).await?;
    ToolResult::json(&json!({ "selected": true, "track": snapshot }))
}

async fn set_arm(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("track_set_arm")?;
    let args: ArmArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    live.command(
        "/live/track/set/arm",
        &[Value::Int(index), Value::Int(args.armed as i64)],
    )
    .await?;
    ToolResult::json(&track_snapshot(&live, index).await?)
}

async fn rename(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("track_rename")?;
    let args: RenameArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    live.command(
        "/live/track/set/name",
        &[Value::Int(index), Value::String(args.name)],
    )
    .await?;
    ToolResult::json(&track_snapshot(&live, index).await?)
}
