//! Song transport: play, stop, record, tempo, position, metronome.

use super::{no_params, parse_args};
use crate::context::ToolContext;
use crate::convert::{parse_tempo_input, NumberOrText};
use crate::error::Result;
use crate::live::Live;
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{is_recording, num, transport_snapshot};
use liveline_osc::Value;
use serde::Deserialize;
use serde_json::json;

pub const ERROR_PREFIX: &str = "TRANSPORT_ERROR";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "transport_play",
            "Start playback from the current position. Returns transport state.",
            no_params(),
        ),
        ToolDefinition::new(
            "transport_stop",
            "Stop playback. Returns transport state.",
            no_params(),
        ),
        ToolDefinition::new(
            "transport_continue",
            "Continue playback from where it was stopped. Returns transport state.",
            no_params(),
        ),
        ToolDefinition::new(
            "transport_record",
            "Start session recording. No-op if already recording. Returns transport state.",
            no_params(),
        ),
        ToolDefinition::new("transport_get_tempo", "Get the current tempo in BPM.", no_params()),
        ToolDefinition::new(
            "transport_set_tempo",
            "Set tempo: absolute BPM (20-999), relative change ('+5', '-10'), or 'double'/'half'.",
            json!({
                "type": "object",
                "properties": {
                    "tempo": {
                        "oneOf": [
                            { "type": "number", "description": "Absolute BPM (20-999)" },
                            { "type": "string", "description": "Relative change: '+5', '-10', 'double', 'half'" }
                        ]
                    }
                },
                "required": ["tempo"]
            }),
        ),
        ToolDefinition::new(
            "transport_get_position",
            "Get the current playback position in beats.",
            no_params(),
        ),
        ToolDefinition::new(
            "transport_set_position",
            "Jump to a playback position in beats.",
            json!({
                "type": "object",
                "properties": {
                    "position": { "type": "number", "description": "Position in beats (0 = song start)" }
                },
                "required": ["position"]
            }),
        ),
        ToolDefinition::new(
            "transport_get_metronome",
            "Get whether the metronome is on.",
            no_params(),
        ),
        ToolDefinition::new(
            "transport_set_metronome",
            "Turn the metronome on or off.",
            json!({
                "type": "object",
                "properties": {
                    "enabled": { "type": "boolean", "description": "true to enable, false to disable" }
                },
                "required": ["enabled"]
            }),
        ),
    ]
}

#[derive(Deserialize)]
struct TempoArgs {
    tempo: NumberOrText,
}

#[derive(Deserialize)]
struct PositionArgs {
    position: f64,
}

#[derive(Deserialize)]
struct EnabledArgs {
    enabled: bool,
}

pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    if !name.starts_with("transport_") {
        return None;
    }
    let outcome = match name {
        "transport_play" => action(ctx, name, "/live/song/start_playing").await,
        "transport_stop" => action(ctx, name, "/live/song/stop_playing").await,
        "transport_continue" => action(ctx, name, "/live/song/continue_playing").await,
        "transport_record" => record(ctx).await,
        "transport_get_tempo" => get_tempo(ctx).await,
        "transport_set_tempo" => set_tempo(ctx, args).await,
        "transport_get_position" => get_position(ctx).await,
        "transport_set_position" => set_position(ctx, args).await,
        "transport_get_metronome" => get_metronome(ctx).await,
        "transport_set_metronome" => set_metronome(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

async fn respond_with_snapshot(live: &Live) -> Result<ToolResult> {
    ToolResult::json(&transport_snapshot(live).await?)
}

async fn action(ctx: &ToolContext, tool: &str, address: &str) -> Result<ToolResult> {
    ctx.guard_write(tool)?;
    let live = ctx.live().await?;
    live.command(address, &[]).await?;
    respond_with_snapshot(&live).await
}

async fn record(ctx: &ToolContext) -> Result<ToolResult> {
    ctx.guard_write("transport_record")?;
    let live = ctx.live().await?;

    let status = live.get_at("/live/song/get/session_record_status", &[], 0).await?;
    if is_recording(&status) {
        let mut snapshot = transport_snapshot(&live).await?;
        snapshot.note = Some("Already recording".to_string());
        return ToolResult::json(&snapshot);
    }

    live.command("/live/song/trigger_session_record", &[]).await?;
    respond_with_snapshot(&live).await
}

async fn get_tempo(ctx: &ToolContext) -> Result<ToolResult> {
    let live = ctx.live().await?;
    let tempo = live.get_at("/live/song/get/tempo", &[], 0).await?;
    ToolResult::json(&json!({ "tempo": tempo }))
}

async fn set_tempo(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("transport_set_tempo")?;
    let args: TempoArgs = parse_args(args)?;
    let live = ctx.live().await?;

    let current = num(&live.get_at("/live/song/get/tempo", &[], 0).await?);
    let tempo = parse_tempo_input(&args.tempo, current)?;
    live.command("/live/song/set/tempo", &[Value::Float(tempo)]).await?;
    respond_with_snapshot(&live).await
}

async fn get_position(ctx: &ToolContext) -> Result<ToolResult> {
    let live = ctx.live().await?;
    let position = live.get_at("/live/song/get/current_song_time", &[], 0).await?;
    ToolResult::json(&json!({ "position_beats": position }))
}

async fn set_position(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("transport_set_position")?;
    let args: PositionArgs = parse_args(args)?;
    let live = ctx.live().await?;
    live.command("/live/song/set/current_song_time", &[Value::Float(args.position)])
        .await?;
    respond_with_snapshot(&live).await
}

async fn get_metronome(ctx: &ToolContext) -> Result<ToolResult> {
    let live = ctx.live().await?;
    let metronome = live.get_at("/live/song/get/metronome", &[], 0).await?;
    ToolResult::json(&json!({ "metronome": metronome.is_truthy() }))
}

async fn set_metronome(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("transport_set_metronome")?;
    let args: EnabledArgs = parse_args(args)?;
    let live = ctx.live().await?;
    live.command("/live/song/set/metronome", &[Value::Int(args.enabled as i64)])
        .await?;
    respond_with_snapshot(&live).await
}
