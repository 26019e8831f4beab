//! Whole-session overviews.

use super::no_params;
use crate::context::ToolContext;
use crate::error::Result;
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{session_snapshot, session_stats};

pub const ERROR_PREFIX: &str = "SESSION_ERROR";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "session_snapshot",
            "Get a complete session state snapshot including transport, all tracks with clips, devices, routing, and grouping. Use this to understand the full session context before making creative decisions. Does NOT include device parameters or note data (use device_get_parameters and clip_get_notes for those). Return tracks and master track are not included (AbletonOSC limitation).",
            no_params(),
        ),
        ToolDefinition::new(
            "session_stats",
            "Get aggregate project statistics: track counts by type (midi/audio/group), total clip count, device chain summary, tempo, and time signature. Lightweight alternative to full snapshot when you only need counts and overview.",
            no_params(),
        ),
    ]
}

pub async fn handle(ctx: &ToolContext, name: &str, _args: &serde_json::Value) -> Option<ToolResult> {
    let outcome = match name {
        "session_snapshot" => snapshot(ctx).await,
        "session_stats" => stats(ctx).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

async fn snapshot(ctx: &ToolContext) -> Result<ToolResult> {
    let live = ctx.live().await?;
    ToolResult::json(&session_snapshot(&live).await?)
}

async fn stats(ctx: &ToolContext) -> Result<ToolResult> {
    let live = ctx.live().await?;
    ToolResult::json(&session_stats(&live).await?)
}
