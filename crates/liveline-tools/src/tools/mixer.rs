//! Track mixer: volume, pan, mute, solo, sends.

use super::{connect_to_track, parse_args, track_schema as schema};
use crate::context::ToolContext;
use crate::convert::{parse_pan_input, parse_volume_input, NumberOrText};
use crate::error::Result;
use crate::live::Live;
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{num, track_snapshot, PanReading, VolumeReading};
use liveline_osc::Value;
use serde::Deserialize;
use serde_json::json;

pub const ERROR_PREFIX: &str = "MIXER_ERROR";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "mixer_get_volume",
            "Get track volume in both normalized (0.0-1.0) and dB formats.",
            schema(json!({}), &["track"]),
        ),
        ToolDefinition::new(
            "mixer_set_volume",
            "Set track volume. Accepts normalized float (0.0-1.0) or dB string (e.g. \"-6dB\", \"0dB\", \"-inf\").",
            schema(
                json!({ "volume": { "description": "Volume as normalized float (0.0-1.0) or dB string (\"-6dB\", \"0dB\", \"-inf\")" } }),
                &["track", "volume"],
            ),
        ),
        ToolDefinition::new(
            "mixer_get_pan",
            "Get track pan in both normalized (-1.0 to 1.0) and MIDI (0-127) formats.",
            schema(json!({}), &["track"]),
        ),
        ToolDefinition::new(
            "mixer_set_pan",
            "Set track pan using MIDI convention: 0 = hard left, 64 = center, 127 = hard right.",
            schema(
                json!({ "pan": { "type": "integer", "description": "Pan value 0-127 (MIDI convention: 0=left, 64=center, 127=right)" } }),
                &["track", "pan"],
            ),
        ),
        ToolDefinition::new(
            "mixer_set_mute",
            "Mute or unmute a track.",
            schema(
                json!({ "muted": { "type": "boolean", "description": "true to mute, false to unmute" } }),
                &["track", "muted"],
            ),
        ),
        ToolDefinition::new(
            "mixer_set_solo",
            "Solo or unsolo a track.",
            schema(
                json!({ "soloed": { "type": "boolean", "description": "true to solo, false to unsolo" } }),
                &["track", "soloed"],
            ),
        ),
        ToolDefinition::new(
            "mixer_get_send",
            "Get send level for a track to a specific return track.",
            schema(
                json!({ "send": { "type": "integer", "description": "Send index (0-based, corresponds to return track order)" } }),
                &["track", "send"],
            ),
        ),
        ToolDefinition::new(
            "mixer_set_send",
            "Set send level for a track to a specific return track.",
            schema(
                json!({
                    "send": { "type": "integer", "description": "Send index (0-based, corresponds to return track order)" },
                    "level": { "type": "number", "description": "Send level as normalized float (0.0-1.0)" }
                }),
                &["track", "send", "level"],
            ),
        ),
    ]
}

#[derive(Deserialize)]
struct TrackArgs {
    track: serde_json::Value,
}

#[derive(Deserialize)]
struct VolumeArgs {
    track: serde_json::Value,
    volume: NumberOrText,
}

#[derive(Deserialize)]
struct PanArgs {
    track: serde_json::Value,
    pan: NumberOrText,
}

#[derive(Deserialize)]
struct MuteArgs {
    track: serde_json::Value,
    muted: bool,
}

#[derive(Deserialize)]
struct SoloArgs {
    track: serde_json::Value,
    soloed: bool,
}

#[derive(Deserialize)]
struct SendArgs {
    track: serde_json::Value,
    send: i64,
}

#[derive(Deserialize)]
struct SetSendArgs {
    track: serde_json::Value,
    send: i64,
    level: f64,
}

pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    if !name.starts_with("mixer_") {
        return None;
    }
    let outcome = match name {
        "mixer_get_volume" => get_volume(ctx, args).await,
        "mixer_set_volume" => set_volume(ctx, args).await,
        "mixer_get_pan" => get_pan(ctx, args).await,
        "mixer_set_pan" => set_pan(ctx, args).await,
        "mixer_set_mute" => set_mute(ctx, args).await,
        "mixer_set_solo" => set_solo(ctx, args).await,
        "mixer_get_send" => get_send(ctx, args).await,
        "mixer_set_send" => set_send(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

/// Apply a track setter and answer with the track's new state.
async fn set_and_snapshot(live: &Live, address: &str, index: i64, args: &[Value]) -> Result<ToolResult> {
    let mut values = vec![Value::Int(index)];
    values.extend_from_slice(args);
    live.command(address, &values).await?;
    ToolResult::json(&track_snapshot(live, index).await?)
}

async fn get_volume(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: TrackArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    let volume = live.get_at("/live/track/get/volume", &[Value::Int(index)], 0).await?;
    ToolResult::json(&json!({
        "track": index,
        "volume": VolumeReading::from_normalized(num(&volume)),
    }))
}

async fn set_volume(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("mixer_set_volume")?;
    let args: VolumeArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    let normalized = parse_volume_input(&args.volume)?;
    set_and_snapshot(&live, "/live/track/set/volume", index, &[Value::Float(normalized)]).await
}

async fn get_pan(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: TrackArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    let panning = live.get_at("/live/track/get/panning", &[Value::Int(index)], 0).await?;
    ToolResult::json(&json!({
        "track": index,
        "pan": PanReading::from_normalized(num(&panning)),
    }))
}

async fn set_pan(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("mixer_set_pan")?;
    let args: PanArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    let pan = parse_pan_input(&args.pan)?;
    set_and_snapshot(&live, "/live/track/set/panning", index, &[Value::Float(pan)]).await
}

async fn set_mute(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("mixer_set_mute")?;
    let args: MuteArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    set_and_snapshot(&live, "/live/track/set/mute", index, &[Value::Int(args.muted as i64)]).await
}

async fn set_solo(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("mixer_set_solo")?;
    let args: SoloArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    set_and_snapshot(&live, "/live/track/set/solo", index, &[Value::Int(args.soloed as i64)]).await
}

async fn get_send(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: SendArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    let level = live
        .get_at("/live/track/get/send", &[Value::Int(index), Value::Int(args.send)], 0)
        .await?;
    ToolResult::json(&json!({
        "track": index,
        "send_index": args.send,
        "level": level,
    }))
}

async fn set_send(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("mixer_set_send")?;
    let args: SetSendArgs = parse_args(args)?;
    let (live, index) = connect_to_track(ctx, &args.track).await?;
    set_and_snapshot(
        &live,
        "/live/track/set/send",
        index,
        &[Value::Int(args.send), Value::Float(args.level)],
    )
    .await
}
