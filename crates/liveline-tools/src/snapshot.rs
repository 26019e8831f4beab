//! Read-back state from Live.
//!
//! Every write tool answers with a fresh snapshot of what it touched, built
//! from live queries rather than from what was sent.

use crate::convert::{float_pan_to_midi, normalized_to_db};
use crate::error::{Result, ToolError};
use crate::live::{after, at, Live};
use crate::notes::VALUES_PER_NOTE;
use liveline_osc::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// -----------------------------------------------------------------------------
// Value helpers
// -----------------------------------------------------------------------------

pub(crate) fn num(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

pub(crate) fn int(value: &Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

/// Non-negative count.
pub(crate) fn count(value: &Value) -> i64 {
    int(value).max(0)
}

pub(crate) fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Nil => String::new(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn integral(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

// -----------------------------------------------------------------------------
// Track and parameter references
// -----------------------------------------------------------------------------

/// A track given by 0-based index or by exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRef {
    Index(i64),
    Name(String),
}

impl TrackRef {
    pub fn parse(value: &serde_json::Value) -> Result<Self> {
        if let Some(name) = value.as_str() {
            return Ok(TrackRef::Name(name.to_string()));
        }
        match integral(value) {
            Some(index) => Ok(TrackRef::Index(index)),
            None if value.is_number() => Err(ToolError::InvalidTrack(format!(
                "Expected integer index, got {}",
                value
            ))),
            None => Err(ToolError::InvalidTrack(format!(
                "Expected number or string, got {}",
                json_type_name(value)
            ))),
        }
    }
}

/// A device parameter given by 0-based index or by exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRef {
    Index(i64),
    Name(String),
}

impl ParamRef {
    pub fn parse(value: &serde_json::Value) -> Result<Self> {
        if let Some(name) = value.as_str() {
            return Ok(ParamRef::Name(name.to_string()));
        }
        match integral(value) {
            Some(index) => Ok(ParamRef::Index(index)),
            None => Err(ToolError::InvalidParameter(format!(
                "Expected number or string, got {}",
                json_type_name(value)
            ))),
        }
    }
}

/// Index lookups pass through; names are matched against every track.
pub async fn resolve_track_index(live: &Live, track: &TrackRef) -> Result<i64> {
    let name = match track {
        TrackRef::Index(index) => return Ok(*index),
        TrackRef::Name(name) => name,
    };

    let num_tracks = count(&live.get_at("/live/song/get/num_tracks", &[], 0).await?);
    for i in 0..num_tracks {
        let candidate = live.get_at("/live/track/get/name", &[Value::Int(i)], 0).await?;
        if candidate.as_str() == Some(name.as_str()) {
            return Ok(i);
        }
    }
    Err(ToolError::TrackNotFound(name.clone()))
}

pub async fn parameter_names(live: &Live, track: i64, device: i64) -> Result<Vec<Value>> {
    let response = live
        .get(
            "/live/device/get/parameters/name",
            &[Value::Int(track), Value::Int(device)],
        )
        .await?;
    Ok(after(response, 2))
}

pub async fn resolve_parameter_index(
    live: &Live,
    track: i64,
    device: i64,
    param: &ParamRef,
) -> Result<i64> {
    let name = match param {
        ParamRef::Index(index) => return Ok(*index),
        ParamRef::Name(name) => name,
    };

    let names = parameter_names(live, track, device).await?;
    names
        .iter()
        .position(|n| n.as_str() == Some(name.as_str()))
        .map(|i| i as i64)
        .ok_or_else(|| ToolError::ParameterNotFound {
            name: name.clone(),
            device,
        })
}

// -----------------------------------------------------------------------------
// Transport
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub tempo: f64,
    pub is_playing: bool,
    pub recording: bool,
    pub current_time: f64,
    pub metronome: bool,
    pub time_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Session record status 1 and 2 both mean recording.
pub fn is_recording(status: &Value) -> bool {
    matches!(status.as_i64(), Some(1) | Some(2))
}

pub async fn transport_snapshot(live: &Live) -> Result<TransportSnapshot> {
    let tempo = live.get_at("/live/song/get/tempo", &[], 0).await?;
    let is_playing = live.get_at("/live/song/get/is_playing", &[], 0).await?;
    let current_time = live.get_at("/live/song/get/current_song_time", &[], 0).await?;
    let metronome = live.get_at("/live/song/get/metronome", &[], 0).await?;
    let numerator = live.get_at("/live/song/get/signature_numerator", &[], 0).await?;
    let denominator = live.get_at("/live/song/get/signature_denominator", &[], 0).await?;
    let record_status = live.get_at("/live/song/get/session_record_status", &[], 0).await?;

    Ok(TransportSnapshot {
        tempo: num(&tempo),
        is_playing: is_playing.is_truthy(),
        recording: is_recording(&record_status),
        current_time: num(&current_time),
        metronome: metronome.is_truthy(),
        time_signature: format!("{}/{}", numerator, denominator),
        note: None,
    })
}

// -----------------------------------------------------------------------------
// Tracks
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Midi,
    Audio,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeReading {
    pub normalized: f64,
    /// Null for silence.
    pub db: f64,
}

impl VolumeReading {
    pub fn from_normalized(normalized: f64) -> Self {
        Self {
            normalized,
            db: normalized_to_db(normalized),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanReading {
    pub normalized: f64,
    pub midi: i64,
}

impl PanReading {
    pub fn from_normalized(normalized: f64) -> Self {
        Self {
            normalized,
            midi: float_pan_to_midi(normalized),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub index: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub volume: VolumeReading,
    pub pan: PanReading,
    pub mute: bool,
    pub solo: bool,
    pub arm: bool,
    pub device_count: i64,
}

pub async fn track_snapshot(live: &Live, index: i64) -> Result<TrackSnapshot> {
    let track = [Value::Int(index)];
    let name = live.get_at("/live/track/get/name", &track, 0).await?;
    let volume = live.get_at("/live/track/get/volume", &track, 0).await?;
    let panning = live.get_at("/live/track/get/panning", &track, 0).await?;
    let mute = live.get_at("/live/track/get/mute", &track, 0).await?;
    let solo = live.get_at("/live/track/get/solo", &track, 0).await?;
    let arm = live.get_at("/live/track/get/arm", &track, 0).await?;
    let has_midi = live.get_at("/live/track/get/has_midi_input", &track, 0).await?;
    let has_audio = live.get_at("/live/track/get/has_audio_input", &track, 0).await?;
    let num_devices = live.get_at("/live/track/get/num_devices", &track, 0).await?;

    let kind = if has_midi.is_truthy() {
        TrackKind::Midi
    } else if has_audio.is_truthy() {
        TrackKind::Audio
    } else {
        TrackKind::Unknown
    };

    Ok(TrackSnapshot {
        index,
        name: text(&name),
        kind,
        volume: VolumeReading::from_normalized(num(&volume)),
        pan: PanReading::from_normalized(num(&panning)),
        mute: mute.is_truthy(),
        solo: solo.is_truthy(),
        arm: arm.is_truthy(),
        device_count: count(&num_devices),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSlotSummary {
    pub scene: i64,
    pub name: String,
    pub has_clip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub index: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDetail {
    #[serde(flatten)]
    pub track: TrackSnapshot,
    pub input_routing: Value,
    pub output_routing: Value,
    pub is_group: bool,
    pub is_grouped: bool,
    pub clips: Vec<ClipSlotSummary>,
    pub devices: Vec<DeviceSummary>,
}

/// Names of the populated clip slots, by scene. Empty names mark empty slots.
async fn clip_names(live: &Live, track: i64) -> Result<Vec<Value>> {
    let response = live.get("/live/track/get/clips/name", &[Value::Int(track)]).await?;
    Ok(after(response, 1))
}

async fn device_list_values(live: &Live, track: i64, property: &str) -> Result<Vec<Value>> {
    let address = format!("/live/track/get/devices/{}", property);
    let response = live.get(&address, &[Value::Int(track)]).await?;
    Ok(after(response, 1))
}

pub async fn track_detail(live: &Live, index: i64, num_scenes: i64) -> Result<TrackDetail> {
    let track = track_snapshot(live, index).await?;
    let args = [Value::Int(index)];

    let input_routing = live.get_at("/live/track/get/input_routing_type", &args, 1).await?;
    let output_routing = live.get_at("/live/track/get/output_routing_type", &args, 1).await?;
    let is_foldable = live.get_at("/live/track/get/is_foldable", &args, 1).await?;
    let is_grouped = live.get_at("/live/track/get/is_grouped", &args, 1).await?;

    let names = clip_names(live, index).await?;
    let clips = (0..num_scenes)
        .filter_map(|scene| {
            let name = names.get(scene as usize)?;
            name.is_truthy().then(|| ClipSlotSummary {
                scene,
                name: text(name),
                has_clip: true,
            })
        })
        .collect();

    let mut devices = Vec::new();
    if track.device_count > 0 {
        let names = device_list_values(live, index, "name").await?;
        let types = device_list_values(live, index, "type").await?;
        for d in 0..track.device_count as usize {
            devices.push(DeviceSummary {
                index: d as i64,
                name: text(&at(&names, d)),
                kind: device_type_name(&at(&types, d)).to_string(),
            });
        }
    }

    Ok(TrackDetail {
        track,
        input_routing,
        output_routing,
        is_group: is_foldable.is_truthy(),
        is_grouped: is_grouped.is_truthy(),
        clips,
        devices,
    })
}

// -----------------------------------------------------------------------------
// Session
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub transport: TransportSnapshot,
    pub track_count: i64,
    pub scene_count: i64,
    pub tracks: Vec<TrackDetail>,
}

pub async fn session_snapshot(live: &Live) -> Result<SessionSnapshot> {
    let track_count = count(&live.get_at("/live/song/get/num_tracks", &[], 0).await?);
    let scene_count = count(&live.get_at("/live/song/get/num_scenes", &[], 0).await?);
    let transport = transport_snapshot(live).await?;

    let mut tracks = Vec::with_capacity(track_count as usize);
    for t in 0..track_count {
        tracks.push(track_detail(live, t, scene_count).await?);
    }

    Ok(SessionSnapshot {
        transport,
        track_count,
        scene_count,
        tracks,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCounts {
    pub total: i64,
    pub midi: i64,
    pub audio: i64,
    pub group: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub transport: TransportSnapshot,
    pub track_counts: TrackCounts,
    pub scene_count: i64,
    pub total_clips: i64,
    pub total_devices: i64,
    /// Device name to number of instances across all tracks.
    pub device_summary: BTreeMap<String, i64>,
}

pub async fn session_stats(live: &Live) -> Result<SessionStats> {
    let transport = transport_snapshot(live).await?;
    let num_tracks = count(&live.get_at("/live/song/get/num_tracks", &[], 0).await?);
    let scene_count = count(&live.get_at("/live/song/get/num_scenes", &[], 0).await?);

    let mut counts = TrackCounts {
        total: num_tracks,
        ..TrackCounts::default()
    };
    let mut total_clips = 0;
    let mut total_devices = 0;
    let mut device_summary = BTreeMap::new();

    for t in 0..num_tracks {
        let args = [Value::Int(t)];
        let has_midi = live.get_at("/live/track/get/has_midi_input", &args, 0).await?;
        let has_audio = live.get_at("/live/track/get/has_audio_input", &args, 0).await?;
        let is_foldable = live.get_at("/live/track/get/is_foldable", &args, 1).await?;
        let num_devices = count(&live.get_at("/live/track/get/num_devices", &args, 0).await?);

        // group tracks are counted once, as groups
        if is_foldable.is_truthy() {
            counts.group += 1;
        } else if has_midi.is_truthy() {
            counts.midi += 1;
        } else if has_audio.is_truthy() {
            counts.audio += 1;
        }
        total_devices += num_devices;

        total_clips += clip_names(live, t)
            .await?
            .iter()
            .filter(|n| n.is_truthy())
            .count() as i64;

        if num_devices > 0 {
            for name in device_list_values(live, t, "name").await? {
                *device_summary.entry(text(&name)).or_insert(0) += 1;
            }
        }
    }

    Ok(SessionStats {
        transport,
        track_counts: counts,
        scene_count,
        total_clips,
        total_devices,
        device_summary,
    })
}

// -----------------------------------------------------------------------------
// Clips
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSnapshot {
    pub track_index: i64,
    pub clip_index: i64,
    pub name: String,
    pub length: f64,
    pub loop_start: f64,
    pub loop_end: f64,
    pub looping: bool,
    pub is_midi: bool,
    pub note_count: usize,
}

pub async fn clip_snapshot(live: &Live, track: i64, clip: i64) -> Result<ClipSnapshot> {
    let args = [Value::Int(track), Value::Int(clip)];
    let name = live.get_at("/live/clip/get/name", &args, 2).await?;
    let length = live.get_at("/live/clip/get/length", &args, 2).await?;
    let loop_start = live.get_at("/live/clip/get/loop_start", &args, 2).await?;
    let loop_end = live.get_at("/live/clip/get/loop_end", &args, 2).await?;
    let looping = live.get_at("/live/clip/get/looping", &args, 2).await?;
    let is_midi = live.get_at("/live/clip/get/is_midi_clip", &args, 2).await?;
    let notes = after(live.get("/live/clip/get/notes", &args).await?, 2);

    Ok(ClipSnapshot {
        track_index: track,
        clip_index: clip,
        name: text(&name),
        length: num(&length),
        loop_start: num(&loop_start),
        loop_end: num(&loop_end),
        looping: looping.is_truthy(),
        is_midi: is_midi.is_truthy(),
        note_count: notes.len() / VALUES_PER_NOTE,
    })
}

// -----------------------------------------------------------------------------
// Devices
// -----------------------------------------------------------------------------

/// Live's device type ids.
pub fn device_type_name(type_id: &Value) -> &'static str {
    match type_id.as_i64() {
        Some(1) => "audio_effect",
        Some(2) => "instrument",
        Some(4) => "midi_effect",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub track_index: i64,
    pub device_index: i64,
    pub name: String,
    pub class_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub type_id: Value,
    pub parameter_count: i64,
}

pub async fn device_snapshot(live: &Live, track: i64, device: i64) -> Result<DeviceSnapshot> {
    let args = [Value::Int(track), Value::Int(device)];
    let name = live.get_at("/live/device/get/name", &args, 2).await?;
    let class_name = live.get_at("/live/device/get/class_name", &args, 2).await?;
    let type_id = live.get_at("/live/device/get/type", &args, 2).await?;
    let num_parameters = live.get_at("/live/device/get/num_parameters", &args, 2).await?;

    Ok(DeviceSnapshot {
        track_index: track,
        device_index: device,
        name: text(&name),
        class_name: text(&class_name),
        kind: device_type_name(&type_id).to_string(),
        type_id,
        parameter_count: count(&num_parameters),
    })
}
