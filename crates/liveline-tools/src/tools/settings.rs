//! Server settings exposed as tools.

use super::parse_args;
use crate::context::ToolContext;
use crate::error::Result;
use crate::result::{ToolDefinition, ToolResult};
use serde::Deserialize;
use serde_json::json;

pub const ERROR_PREFIX: &str = "SETTINGS_ERROR";

pub fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition::new(
        "set_read_only",
        "Enable or disable read-only mode. While enabled, every tool that changes the Live set is refused.",
        json!({
            "type": "object",
            "properties": {
                "enabled": { "type": "boolean", "description": "true to block write tools, false to allow them" }
            },
            "required": ["enabled"]
        }),
    )]
}

#[derive(Deserialize)]
struct ReadOnlyArgs {
    enabled: bool,
}

/// Always allowed, including in read-only mode.
pub async fn handle(ctx: &ToolContext, name: &str, args: &serde_json::Value) -> Option<ToolResult> {
    let outcome = match name {
        "set_read_only" => set_read_only(ctx, args),
        _ => return None,
    };
    Some(ctx.finish(ERROR_PREFIX, outcome))
}

fn set_read_only(ctx: &ToolContext, args: &serde_json::Value) -> Result<ToolResult> {
    let args: ReadOnlyArgs = parse_args(args)?;
    ctx.set_read_only(args.enabled);
    ToolResult::json(&json!({ "read_only": ctx.is_read_only() }))
}
