//! MIDI clips in session view slots: create, delete, notes, loop points.

use super::{connect_to_track, parse_args, scene_param, track_schema};
use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::live::{after, Live};
use crate::notes::{flat_to_notes, notes_to_flat, validate_notes, NoteSpec, VALUES_PER_NOTE};
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{clip_snapshot, num, ClipSnapshot};
use liveline_osc::Value;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const ERROR_PREFIX: &str = "CLIP_ERROR";

/// Above this many notes, `clip_add_notes` sends several messages.
pub const NOTE_CHUNK_SIZE: usize = 100;

const DEFAULT_CLIP_LENGTH: f64 = 4.0;
const ALL_PITCHES: i64 = 128;
const ALL_TIME: f64 = 16384.0;

fn slot_schema(extra: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let mut properties = json!({ "scene": scene_param() });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    track_schema(properties, required)
}

fn range_properties(verb: &str) -> serde_json::Value {
    json!({
        "pitch_start": { "type": "integer", "description": format!("Minimum pitch {} (default 0)", verb) },
        "pitch_span": { "type": "integer", "description": "Number of pitches from start (default 128 = all)" },
        "time_start": { "type": "number", "description": format!("Start time {} in beats (default 0)", verb) },
        "time_span": { "type": "number", "description": "Time range in beats (default 16384 = all)" }
    })
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "clip_create",
            "Create a new empty MIDI clip in a clip slot. Length is in beats (e.g., 4.0 = one bar at 4/4). Can only create on MIDI tracks in empty slots.",
            slot_schema(
                json!({
                    "length": { "type": "number", "description": "Clip length in beats (default 4.0)" },
                    "name": { "type": "string", "description": "Optional clip name" }
                }),
                &["track", "scene"],
            ),
        ),
        ToolDefinition::new(
            "clip_delete",
            "Delete a clip from a clip slot.",
            slot_schema(json!({}), &["track", "scene"]),
        ),
        ToolDefinition::new(
            "clip_get",
            "Get clip properties including name, length, loop points, whether it is a MIDI clip, and note count.",
            slot_schema(json!({}), &["track", "scene"]),
        ),
        ToolDefinition::new(
            "clip_set_name",
            "Set the name of a clip.",
            slot_schema(
                json!({ "name": { "type": "string", "description": "New clip name" } }),
                &["track", "scene", "name"],
            ),
        ),
        ToolDefinition::new(
            "clip_add_notes",
            "Add MIDI notes to an existing clip. Each note needs pitch (0-127, 60=C4 middle C), start_time (beats from clip start), duration (beats), velocity (1-127, default 100), and mute (default false). Notes are added to existing content -- they do not replace.",
            slot_schema(
                json!({
                    "notes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "pitch": { "type": "integer", "description": "MIDI pitch 0-127 (60=C4)" },
                                "start_time": { "type": "number", "description": "Start time in beats from clip start" },
                                "duration": { "type": "number", "description": "Duration in beats" },
                                "velocity": { "type": "integer", "description": "Velocity 1-127 (default 100)" },
                                "mute": { "type": "boolean", "description": "Mute this note (default false)" }
                            },
                            "required": ["pitch", "start_time", "duration"]
                        },
                        "description": "Array of note objects to add"
                    }
                }),
                &["track", "scene", "notes"],
            ),
        ),
        ToolDefinition::new(
            "clip_remove_notes",
            "Remove MIDI notes from a clip by pitch and/or time range. WARNING: Omitting all filter parameters removes ALL notes from the clip.",
            slot_schema(range_properties("to remove"), &["track", "scene"]),
        ),
        ToolDefinition::new(
            "clip_get_notes",
            "Read MIDI notes from a clip. Returns structured note objects with pitch, start_time, duration, velocity, mute. Optionally filter by pitch range and time range.",
            slot_schema(range_properties("filter"), &["track", "scene"]),
        ),
        ToolDefinition::new(
            "clip_set_loop",
            "Set clip loop properties. All time values in beats. Loop start must be less than loop end. When changing both, the order of operations is handled automatically to avoid constraint violations.",
            slot_schema(
                json!({
                    "loop_start": { "type": "number", "description": "Loop start in beats" },
                    "loop_end": { "type": "number", "description": "Loop end in beats" },
                    "looping": { "type": "boolean", "description": "Enable or disable looping" }
                }),
                &["track", "scene"],
            ),
        ),
    ]
}

#[derive(Deserialize)]
struct SlotArgs {
    track: serde_json::Value,
    scene: i64,
}

#[derive(Deserialize)]
struct CreateArgs {
    track: serde_json::Value,
    scene: i64,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct NameArgs {
    track: serde_json::Value,
    scene: i64,
    name: String,
}

#[derive(Deserialize)]
struct AddNotesArgs {
    track: serde_json::Value,
    scene: i64,
    notes: Vec<NoteSpec>,
}

/// Pitch and time window for reading or removing notes.
#[derive(Debug, Default, Deserialize)]
struct NoteRange {
    #[serde(default)]
    pitch_start: Option<i64>,
    #[serde(default)]
    pitch_span: Option<i64>,
    #[serde(default)]
    time_start: Option<f64>,
    #[serde(default)]
    time_span: Option<f64>,
}

impl NoteRange {
    fn is_set(&self) -> bool {
        self.pitch_start.is_some()
            || self.pitch_span.is_some()
            || self.time_start.is_some()
            || self.time_span.is_some()
    }

    /// Slot address, followed by the full window when any bound was given.
    fn args(&self, track: i64, scene: i64) -> Vec<Value> {
        let mut args = vec![Value::Int(track), Value::Int(scene)];
        if self.is_set() {
            args.push(Value::Int(self.pitch_start.unwrap_or(0)));
            args.push(Value::Int(self.pitch_span.unwrap_or(ALL_PITCHES)));
            args.push(Value::Float(self.time_start.unwrap_or(0.0)));
            args.push(Value::Float(self.time_span.unwrap_or(ALL_TIME)));
        }
        args
    }
}

#[derive(Deserialize)]
struct RangeArgs {
    track: serde_json::Value,
    scene: i64,
    #[serde(flatten)]
    range: NoteRange,
}

#[derive(Deserialize)]
struct LoopArgs {
    track: serde_json::Value,
    scene: i64,
    #[serde(default)]
    loop_start: Option<f64>,
    #[serde(default)]
    loop_end: Option<f64>,
    #[serde(default)]
    looping: Option<bool>,
}

#[derive(Serialize)]
struct NotesAdded {
    #[serde(flatten)]
    clip: ClipSnapshot,
    notes_added: usize,
}

/// Owns `clip_*` except `clip_launch` and `clip_stop`, which live with scenes.
pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    let outcome = match name {
        "clip_create" => create(ctx, args).await,
        "clip_delete" => delete(ctx, args).await,
        "clip_get" => get(ctx, args).await,
        "clip_set_name" => set_name(ctx, args).await,
        "clip_add_notes" => add_notes(ctx, args).await,
        "clip_remove_notes" => remove_notes(ctx, args).await,
        "clip_get_notes" => get_notes(ctx, args).await,
        "clip_set_loop" => set_loop(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

fn slot(track: i64, scene: i64) -> [Value; 2] {
    [Value::Int(track), Value::Int(scene)]
}

async fn respond_with_snapshot(live: &Live, track: i64, scene: i64) -> Result<ToolResult> {
    ToolResult::json(&clip_snapshot(live, track, scene).await?)
}

async fn create(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("clip_create")?;
    let args: CreateArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;

    let has_midi = live
        .get_at("/live/track/get/has_midi_input", &[Value::Int(track)], 2)
        .await?;
    if !has_midi.is_truthy() {
        return Err(ToolError::NotMidiTrack(track));
    }

    let has_clip = live
        .get_at("/live/clip_slot/get/has_clip", &slot(track, args.scene), 2)
        .await?;
    if has_clip.is_truthy() {
        return Err(ToolError::SlotNotEmpty {
            track,
            scene: args.scene,
        });
    }

    // zero length means the default, same as a missing one
    let length = args
        .length
        .filter(|l| *l != 0.0)
        .unwrap_or(DEFAULT_CLIP_LENGTH);
    live.command(
        "/live/clip_slot/create_clip",
        &[Value::Int(track), Value::Int(args.scene), Value::Float(length)],
    )
    .await?;

    if let Some(name) = args.name.filter(|n| !n.is_empty()) {
        live.command(
            "/live/clip/set/name",
            &[Value::Int(track), Value::Int(args.scene), Value::String(name)],
        )
        .await?;
    }

    respond_with_snapshot(&live, track, args.scene).await
}

async fn delete(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("clip_delete")?;
    let args: SlotArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    live.command("/live/clip_slot/delete_clip", &slot(track, args.scene))
        .await?;
    ToolResult::json(&json!({
        "deleted": true,
        "track_index": track,
        "clip_index": args.scene,
    }))
}

async fn get(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: SlotArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    respond_with_snapshot(&live, track, args.scene).await
}

async fn set_name(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("clip_set_name")?;
    let args: NameArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    live.command(
        "/live/clip/set/name",
        &[Value::Int(track), Value::Int(args.scene), Value::String(args.name)],
    )
    .await?;
    respond_with_snapshot(&live, track, args.scene).await
}

async fn add_notes(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("clip_add_notes")?;
    let args: AddNotesArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    let notes = validate_notes(&args.notes)?;
    let flat = notes_to_flat(&notes);

    // small batches go in one message
    let chunk_len = if notes.len() > NOTE_CHUNK_SIZE {
        NOTE_CHUNK_SIZE * VALUES_PER_NOTE
    } else {
        flat.len()
    };
    for chunk in flat.chunks(chunk_len) {
        let mut values = slot(track, args.scene).to_vec();
        values.extend_from_slice(chunk);
        live.command("/live/clip/add/notes", &values).await?;
    }
    tracing::debug!(track, scene = args.scene, notes = notes.len(), "Notes added");

    let clip = clip_snapshot(&live, track, args.scene).await?;
    ToolResult::json(&NotesAdded {
        clip,
        notes_added: notes.len(),
    })
}

async fn remove_notes(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("clip_remove_notes")?;
    let args: RangeArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    live.command("/live/clip/remove/notes", &args.range.args(track, args.scene))
        .await?;
    respond_with_snapshot(&live, track, args.scene).await
}

async fn get_notes(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: RangeArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    let response = live
        .get("/live/clip/get/notes", &args.range.args(track, args.scene))
        .await?;
    let notes = flat_to_notes(&after(response, 2));
    ToolResult::json(&json!({
        "track_index": track,
        "clip_index": args.scene,
        "note_count": notes.len(),
        "notes": notes,
    }))
}

/// Loop start must stay below loop end in Live at every step, so when both
/// move the order depends on which way the end goes.
async fn set_loop(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("clip_set_loop")?;
    let args: LoopArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;

    if args.loop_start.is_none() && args.loop_end.is_none() && args.looping.is_none() {
        return Err(ToolError::MissingParams("loop_start, loop_end, or looping"));
    }

    let set = |address: &'static str, value: Value| {
        let live = live.clone();
        let values = vec![Value::Int(track), Value::Int(args.scene), value];
        async move { live.command(address, &values).await }
    };

    if let Some(looping) = args.looping {
        set("/live/clip/set/looping", Value::Int(looping as i64)).await?;
    }

    match (args.loop_start, args.loop_end) {
        (Some(start), Some(end)) => {
            let current_end = num(
                &live
                    .get_at("/live/clip/get/loop_end", &slot(track, args.scene), 2)
                    .await?,
            );
            if end > current_end {
                set("/live/clip/set/loop_end", Value::Float(end)).await?;
                set("/live/clip/set/loop_start", Value::Float(start)).await?;
            } else {
                set("/live/clip/set/loop_start", Value::Float(start)).await?;
                set("/live/clip/set/loop_end", Value::Float(end)).await?;
            }
        }
        (Some(start), None) => {
            set("/live/clip/set/loop_start", Value::Float(start)).await?;
        }
        (None, Some(end)) => {
            set("/live/clip/set/loop_end", Value::Float(end)).await?;
        }
        (None, None) => {}
    }

    respond_with_snapshot(&live, track, args.scene).await
}
