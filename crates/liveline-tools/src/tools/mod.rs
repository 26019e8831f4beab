//! Tool handlers, one module per area of Live.
//!
//! Each module exposes `definitions()` and an async `handle()` that returns
//! `None` for tools it does not own.

pub mod clip;
pub mod device;
pub mod health;
pub mod mixer;
pub mod sample;
pub mod scene;
pub mod session;
pub mod settings;
pub mod track;
pub mod transport;

use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::live::Live;
use crate::snapshot::{resolve_track_index, TrackRef};
use serde::de::DeserializeOwned;
use serde_json::json;

/// Deserialize tool arguments. Missing arguments count as an empty object.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &serde_json::Value) -> Result<T> {
    let args = if args.is_null() {
        json!({})
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn no_params() -> serde_json::Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

pub(crate) fn track_param() -> serde_json::Value {
    json!({ "description": "Track index (0-based integer) or track name (string)" })
}

/// Object schema with a `track` property plus `extra` properties.
pub(crate) fn track_schema(extra: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let mut properties = json!({ "track": track_param() });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Connect and resolve a track reference in one step.
pub(crate) async fn connect_to_track(
    ctx: &ToolContext,
    track: &serde_json::Value,
) -> Result<(Live, i64)> {
    let track = TrackRef::parse(track)?;
    let live = ctx.live().await?;
    let index = resolve_track_index(&live, &track).await?;
    Ok((live, index))
}

pub(crate) fn scene_param() -> serde_json::Value {
    json!({ "type": "integer", "description": "0-based scene/clip slot index" })
}

pub(crate) fn device_param() -> serde_json::Value {
    json!({ "type": "integer", "description": "0-based device index" })
}
