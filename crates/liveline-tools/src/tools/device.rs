//! Devices on a track's chain and their parameters.

use super::{connect_to_track, device_param, parse_args, track_schema};
use crate::context::ToolContext;
use crate::error::{Result, ToolError};
use crate::live::{after, at, Live};
use crate::result::{ToolDefinition, ToolResult};
use crate::snapshot::{
    count, device_snapshot, device_type_name, parameter_names, resolve_parameter_index, text,
    DeviceSnapshot, ParamRef,
};
use liveline_osc::{Timeouts, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const ERROR_PREFIX: &str = "DEVICE_ERROR";

/// Name of the on/off parameter on native devices.
const DEVICE_ON: &str = "Device On";

fn device_schema(extra: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let mut properties = json!({ "device": device_param() });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    track_schema(properties, required)
}

fn parameter_param() -> serde_json::Value {
    json!({ "description": "Parameter index (0-based) or name" })
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "device_list",
            "List all devices on a track in chain order with name, type, and class.",
            track_schema(json!({}), &["track"]),
        ),
        ToolDefinition::new(
            "device_get",
            "Get detailed info for a single device including name, type, class, and parameter count.",
            device_schema(json!({}), &["track", "device"]),
        ),
        ToolDefinition::new(
            "device_toggle",
            "Toggle a device on/off. Uses the \"Device On\" parameter (parameter 0 for most native devices). Returns error if device has no toggleable parameter.",
            device_schema(
                json!({ "enabled": { "type": "boolean", "description": "true to enable, false to disable" } }),
                &["track", "device", "enabled"],
            ),
        ),
        ToolDefinition::new(
            "device_get_parameters",
            "List all parameters of a device with names, current values, min/max ranges, and quantization info.",
            device_schema(json!({}), &["track", "device"]),
        ),
        ToolDefinition::new(
            "device_get_parameter",
            "Get a single device parameter by index or name, including its human-readable value string.",
            device_schema(
                json!({ "parameter": parameter_param() }),
                &["track", "device", "parameter"],
            ),
        ),
        ToolDefinition::new(
            "device_set_parameter",
            "Set a device parameter value by index or name. Validates value is within min/max range.",
            device_schema(
                json!({
                    "parameter": parameter_param(),
                    "value": { "type": "number", "description": "New value (must be within parameter min/max range)" }
                }),
                &["track", "device", "parameter", "value"],
            ),
        ),
        ToolDefinition::new(
            "device_select",
            "Select a device in Ableton Live's UI (opens device view).",
            device_schema(json!({}), &["track", "device"]),
        ),
        ToolDefinition::new(
            "device_delete",
            "Delete a device from a track's device chain. WARNING: Device indices shift after deletion.",
            device_schema(json!({}), &["track", "device"]),
        ),
        ToolDefinition::new(
            "device_load",
            "Load an Ableton instrument or effect onto a track from the browser. Requires an AbletonOSC build with /live/track/insert_device. Common names: Wavetable, Operator, Drift, Simpler, Reverb, Delay, EQ Eight, Compressor, Auto Filter, Utility, Arpeggiator.",
            track_schema(
                json!({
                    "device_name": {
                        "type": "string",
                        "description": "Ableton device name (e.g., \"Wavetable\", \"Reverb\", \"EQ Eight\", \"Compressor\"). Must match browser name."
                    }
                }),
                &["track", "device_name"],
            ),
        ),
    ]
}

#[derive(Deserialize)]
struct TrackArgs {
    track: serde_json::Value,
}

#[derive(Deserialize)]
struct DeviceArgs {
    track: serde_json::Value,
    device: i64,
}

#[derive(Deserialize)]
struct ToggleArgs {
    track: serde_json::Value,
    device: i64,
    enabled: bool,
}

#[derive(Deserialize)]
struct ParameterArgs {
    track: serde_json::Value,
    device: i64,
    parameter: serde_json::Value,
}

#[derive(Deserialize)]
struct SetParameterArgs {
    track: serde_json::Value,
    device: i64,
    parameter: serde_json::Value,
    value: f64,
}

#[derive(Deserialize)]
struct LoadArgs {
    track: serde_json::Value,
    device_name: String,
}

#[derive(Debug, Serialize)]
struct DeviceEntry {
    index: i64,
    name: Value,
    class_name: Value,
    #[serde(rename = "type")]
    kind: &'static str,
    type_id: Value,
}

#[derive(Debug, Serialize)]
struct ParameterEntry {
    index: i64,
    name: Value,
    value: Value,
    min: Value,
    max: Value,
    is_quantized: bool,
}

#[derive(Serialize)]
struct Toggled {
    #[serde(flatten)]
    device: DeviceSnapshot,
    enabled: bool,
    toggle_parameter_index: i64,
}

#[derive(Serialize)]
struct Deleted {
    deleted: bool,
    #[serde(flatten)]
    device: DeviceSnapshot,
}

pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    if !name.starts_with("device_") {
        return None;
    }
    let outcome = match name {
        "device_list" => list(ctx, args).await,
        "device_get" => get(ctx, args).await,
        "device_toggle" => toggle(ctx, args).await,
        "device_get_parameters" => get_parameters(ctx, args).await,
        "device_get_parameter" => get_parameter(ctx, args).await,
        "device_set_parameter" => set_parameter(ctx, args).await,
        "device_select" => select(ctx, args).await,
        "device_delete" => delete(ctx, args).await,
        "device_load" => load(ctx, args).await,
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

/// Per-device values after the echoed track id.
async fn chain_values(live: &Live, track: i64, property: &str) -> Result<Vec<Value>> {
    let address = format!("/live/track/get/devices/{}", property);
    Ok(after(live.get(&address, &[Value::Int(track)]).await?, 1))
}

/// Per-parameter values after the echoed track and device ids.
async fn parameter_values(live: &Live, track: i64, device: i64, property: &str) -> Result<Vec<Value>> {
    let address = format!("/live/device/get/parameters/{}", property);
    let response = live
        .get(&address, &[Value::Int(track), Value::Int(device)])
        .await?;
    Ok(after(response, 2))
}

/// One parameter's property; the reply echoes track, device and parameter.
async fn parameter_value(
    live: &Live,
    track: i64,
    device: i64,
    parameter: i64,
    property: &str,
) -> Result<Value> {
    let address = format!("/live/device/get/parameter/{}", property);
    live.get_at(
        &address,
        &[Value::Int(track), Value::Int(device), Value::Int(parameter)],
        3,
    )
    .await
}

async fn set_parameter_value(live: &Live, track: i64, device: i64, parameter: i64, value: f64) -> Result<()> {
    live.command(
        "/live/device/set/parameter/value",
        &[
            Value::Int(track),
            Value::Int(device),
            Value::Int(parameter),
            Value::Float(value),
        ],
    )
    .await?;
    Ok(())
}

async fn list(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: TrackArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;

    let num_devices = count(
        &live
            .get_at("/live/track/get/num_devices", &[Value::Int(track)], 1)
            .await?,
    );
    if num_devices == 0 {
        return ToolResult::json(&json!({
            "track_index": track,
            "device_count": 0,
            "devices": [],
        }));
    }

    let names = chain_values(&live, track, "name").await?;
    let types = chain_values(&live, track, "type").await?;
    let classes = chain_values(&live, track, "class_name").await?;
    if names.len() as i64 != num_devices {
        tracing::warn!(
            track,
            expected = num_devices,
            got = names.len(),
            "Device name count does not match num_devices"
        );
    }

    let devices: Vec<DeviceEntry> = (0..num_devices as usize)
        .map(|i| {
            let type_id = at(&types, i);
            DeviceEntry {
                index: i as i64,
                name: at(&names, i),
                class_name: at(&classes, i),
                kind: device_type_name(&type_id),
                type_id,
            }
        })
        .collect();

    ToolResult::json(&json!({
        "track_index": track,
        "device_count": num_devices,
        "devices": devices,
    }))
}

async fn get(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: DeviceArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    ToolResult::json(&device_snapshot(&live, track, args.device).await?)
}

/// Parameter 0 is checked first since most native devices keep the switch there.
async fn toggle(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("device_toggle")?;
    let args: ToggleArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;

    let first = parameter_value(&live, track, args.device, 0, "name").await?;
    let toggle_index = if first.as_str() == Some(DEVICE_ON) {
        0
    } else {
        parameter_names(&live, track, args.device)
            .await?
            .iter()
            .position(|n| n.as_str() == Some(DEVICE_ON))
            .map(|i| i as i64)
            .ok_or(ToolError::ToggleUnsupported)?
    };

    let value = if args.enabled { 1.0 } else { 0.0 };
    set_parameter_value(&live, track, args.device, toggle_index, value).await?;

    let device = device_snapshot(&live, track, args.device).await?;
    ToolResult::json(&Toggled {
        device,
        enabled: args.enabled,
        toggle_parameter_index: toggle_index,
    })
}

async fn get_parameters(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: DeviceArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    let device = args.device;

    let num_parameters = count(
        &live
            .get_at(
                "/live/device/get/num_parameters",
                &[Value::Int(track), Value::Int(device)],
                2,
            )
            .await?,
    );
    let names = parameter_values(&live, track, device, "name").await?;
    let values = parameter_values(&live, track, device, "value").await?;
    let mins = parameter_values(&live, track, device, "min").await?;
    let maxs = parameter_values(&live, track, device, "max").await?;
    let quantized = parameter_values(&live, track, device, "is_quantized").await?;

    let parameters: Vec<ParameterEntry> = (0..num_parameters as usize)
        .map(|i| ParameterEntry {
            index: i as i64,
            name: at(&names, i),
            value: at(&values, i),
            min: at(&mins, i),
            max: at(&maxs, i),
            is_quantized: at(&quantized, i).is_truthy(),
        })
        .collect();

    ToolResult::json(&json!({
        "track_index": track,
        "device_index": device,
        "parameter_count": num_parameters,
        "parameters": parameters,
    }))
}

async fn get_parameter(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: ParameterArgs = parse_args(args)?;
    let param = ParamRef::parse(&args.parameter)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    let index = resolve_parameter_index(&live, track, args.device, &param).await?;

    let value = parameter_value(&live, track, args.device, index, "value").await?;
    let name = parameter_value(&live, track, args.device, index, "name").await?;
    let value_string = parameter_value(&live, track, args.device, index, "value_string").await?;

    ToolResult::json(&json!({
        "track_index": track,
        "device_index": args.device,
        "parameter_index": index,
        "name": text(&name),
        "value": value,
        "value_string": value_string,
    }))
}

/// Reject `value` when it falls outside the parameter's reported range.
/// A missing bound does not constrain.
fn check_range(value: f64, min: Value, max: Value, parameter: i64) -> Result<()> {
    let below = min.as_f64().is_some_and(|m| value < m);
    let above = max.as_f64().is_some_and(|m| value > m);
    if below || above {
        return Err(ToolError::ValueOutOfRange {
            value,
            min,
            max,
            parameter,
        });
    }
    Ok(())
}

async fn set_parameter(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("device_set_parameter")?;
    let args: SetParameterArgs = parse_args(args)?;
    let param = ParamRef::parse(&args.parameter)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    let index = resolve_parameter_index(&live, track, args.device, &param).await?;

    let mins = parameter_values(&live, track, args.device, "min").await?;
    let maxs = parameter_values(&live, track, args.device, "max").await?;
    let slot = usize::try_from(index).unwrap_or(usize::MAX);
    check_range(args.value, at(&mins, slot), at(&maxs, slot), index)?;

    set_parameter_value(&live, track, args.device, index, args.value).await?;
    let value_string = parameter_value(&live, track, args.device, index, "value_string").await?;

    ToolResult::json(&json!({
        "track_index": track,
        "device_index": args.device,
        "parameter_index": index,
        "value": args.value,
        "value_string": value_string,
    }))
}

async fn select(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("device_select")?;
    let args: DeviceArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;
    live.command(
        "/live/view/set/selected_device",
        &[Value::Int(track), Value::Int(args.device)],
    )
    .await?;
    ToolResult::json(&device_snapshot(&live, track, args.device).await?)
}

/// The snapshot is taken before deleting; afterwards the index points elsewhere.
async fn delete(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("device_delete")?;
    let args: DeviceArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;

    let device = device_snapshot(&live, track, args.device).await?;
    live.command(
        "/live/track/delete_device",
        &[Value::Int(track), Value::Int(args.device)],
    )
    .await?;
    tracing::info!(track, device = args.device, name = %device.name, "Device deleted");

    ToolResult::json(&Deleted {
        deleted: true,
        device,
    })
}

/// Index of the inserted device. Replies are either `[index]` or
/// `[track, index]`.
fn inserted_index(response: &[Value]) -> i64 {
    match response {
        [only] => only.as_i64().unwrap_or(-1),
        [.., last] => last.as_i64().unwrap_or(-1),
        [] => -1,
    }
}

async fn load(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    ctx.guard_write("device_load")?;
    let args: LoadArgs = parse_args(args)?;
    let (live, track) = connect_to_track(ctx, &args.track).await?;

    // the browser loads onto the selected track
    live.command("/live/view/set/selected_track", &[Value::Int(track)])
        .await?;

    let response = match live
        .query(
            "/live/track/insert_device",
            &[Value::Int(track), Value::String(args.device_name.clone())],
            Timeouts::LOAD_DEVICE,
        )
        .await
    {
        Ok(response) => response,
        Err(ToolError::Osc(err)) if err.is_timeout() => return Err(ToolError::LoadTimedOut),
        Err(err) => return Err(err),
    };

    let index = inserted_index(&response);
    if index == -1 {
        return Err(ToolError::DeviceNotFound(args.device_name));
    }
    tracing::info!(track, device = index, name = %args.device_name, "Device loaded");

    ToolResult::json(&device_snapshot(&live, track, index).await?)
}
