//! Scenes, plus launching and stopping single clips.

use super::{connect_to_track, no_params, parse_args, track_schema};
use crate::context::ToolContext;
use crate::error::Result;
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{count, text};
use liveline_osc::Value;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const ERROR_PREFIX: &str = "SCENE_ERROR";

fn scene_index() -> serde_json::Value {
    json!({ "type": "integer", "description": "0-based scene index" })
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "scene_list",
            "List all scenes with names. If include_clips is true (default), also shows which clip slots are populated across all tracks.",
            json!({
                "type": "object",
                "properties": {
                    "include_clips": { "type": "boolean", "description": "Include clip slot population info per track (default true)" }
                },
                "required": []
            }),
        ),
        ToolDefinition::new(
            "scene_launch",
            "Launch a scene by index (0-based). All clips in the scene's row will be launched.",
            json!({
                "type": "object",
                "properties": { "scene": scene_index() },
                "required": ["scene"]
            }),
        ),
        ToolDefinition::new("scene_stop", "Stop all playing clips in the session.", no_params()),
        ToolDefinition::new(
            "clip_launch",
            "Launch a specific clip by track and scene position. Track by index or name, scene by 0-based index.",
            track_schema(json!({ "scene": scene_index() }), &["track", "scene"]),
        ),
        ToolDefinition::new(
            "clip_stop",
            "Stop a specific clip. Track by index or name, scene by 0-based index.",
            track_schema(json!({ "scene": scene_index() }), &["track", "scene"]),
        ),
        ToolDefinition::new(
            "scene_create",
            "Create a new empty scene. Specify index for position (0-based), or omit to append at end.",
            json!({
                "type": "object",
                "properties": {
                    "index": { "type": "integer", "description": "0-based insertion position. Omit or -1 to append at end." }
                },
                "required": []
            }),
        ),
        ToolDefinition::new(
            "scene_rename",
            "Rename a scene by index (0-based).",
            json!({
                "type": "object",
                "properties": {
                    "scene": scene_index(),
                    "name": { "type": "string", "description": "New name for the scene" }
                },
                "required": ["scene", "name"]
            }),
        ),
    ]
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default = "default_true")]
    include_clips: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct SceneArgs {
    scene: i64,
}

#[derive(Deserialize)]
struct ClipSlotArgs {
    track: serde_json::Value,
    scene: i64,
}

#[derive(Deserialize)]
struct CreateArgs {
    #[serde(default)]
    index: Option<i64>,
}

#[derive(Deserialize)]
struct RenameArgs {
    scene: i64,
    name: String,
}

#[derive(Debug, Serialize)]
struct SceneClip {
    track_index: i64,
    track_name: String,
}

#[derive(Debug, Serialize)]
struct SceneEntry {
    index: i64,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    clips: Option<Vec<SceneClip>>,
}

/// Owns `scene_*` plus `clip_launch` and `clip_stop`.
pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    let outcome = match name {
        "scene_list" => list(ctx, args).await,
        "scene_launch" => launch(ctx, args).await,
        "scene_stop" => stop_all(ctx).await,
        "clip_launch" => clip_action(ctx, name, "/live/clip/fire", "launched", args).await,
        "clip_stop" => clip_action(ctx, name, "/live/clip/stop", "stopped", args).await,
        "scene_create" => create(ctx, args).await,
        "scene_rename" => rename(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

async fn list(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: ListArgs = parse_args(args)?;
    let live = ctx.live().await?;
    let scene_count = count(&live.get_at("/live/song/get/num_scenes", &[], 0).await?);
    let track_count = count(&live.get_at("/live/song/get/num_tracks", &[], 0).await?);

    let mut scenes = Vec::with_capacity(scene_count as usize);
    for s in 0..scene_count {
        let name = live.get_at("/live/scene/get/name", &[Value::Int(s)], 0).await?;
        let clips = if args.include_clips {
            let mut clips = Vec::new();
            for t in 0..track_count {
                let has_clip = live
                    .get_at("/live/clip_slot/get/has_clip", &[Value::Int(t), Value::Int(s)], 0)
                    .await?;
                if has_clip.is_truthy() {
                    let track_name = live.get_at("/live/track/get/name", &[Value::Int(t)], 0).await?;
                    clips.push(SceneClip {
                        track_index: t,
                        track_name: text(&track_name),
                    });
                }
            }
            Some(clips)
        } else {
            None
        };
        scenes.push(SceneEntry {
            index: s,
            name: text(&name),
            clips,
        });
    }

    ToolResult::json(&json!({
        "scene_count": scene_count,
        "track_count": track_count,
        "scenes": scenes,
    }))
}

async fn launch(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("scene_launch")?;
    let args: SceneArgs = parse_args(args)?;
    let live = ctx.live().await?;
    live.command("/live/scene/fire", &[Value::Int(args.scene)]).await?;
    ToolResult::json(&json!({ "launched": true, "scene": args.scene }))
}

async fn stop_all(ctx: &ToolContext) -> Result<ToolResult> {
    ctx.guard_write("scene_stop")?;
    let live = ctx.live().await?;
    live.command("/live/song/stop_all_clips", &[]).await?;
    ToolResult::json(&json!({ "stopped": true }))
}

async fn clip_action(
    ctx: &ToolContext,
    tool: &str,
    address: &str,
    flag: &str,
    args: &serde_json::Value,
) -> Result<ToolResult> {
    ctx.guard_write(tool)?;
    let args: ClipSlotArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    live.command(address, &[Value::Int(index), Value::Int(args.scene)])
        .await?;
    ToolResult::json(&json!({ flag: true, "track": index, "scene": args.scene }))
}

async fn create(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("scene_create")?;
    let args: CreateArgs = parse_args(args)?;
    let live = ctx.live().await?;
    live.command("/live/song/create_scene", &[Value::Int(args.index.unwrap_or(-1))])
        .await?;
    let total = live.get_at("/live/song/get/num_scenes", &[], 0).await?;
    ToolResult::json(&json!({ "created": true, "total_scenes": total }))
}

async fn rename(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("scene_rename")?;
    let args: RenameArgs = parse_args(args)?;
    let live = ctx.live().await?;
    live.command(
        "/live/scene/set/name",
        &[Value::Int(args.scene), Value::String(args.name.clone())],
    )
    .await?;
    ToolResult::json(&json!({ "renamed": true, "scene": args.scene, "name": args.name }))
}
