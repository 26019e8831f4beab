//! Connectivity check against AbletonOSC.

use super::no_params;
use crate::context::ToolContext;
use crate::result::{ToolDefinition, ToolResult};
use liveline_osc::{OscError, OscSession};
use serde::Serialize;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition::new(
        "ableton_status",
        "Check Ableton Live connectivity and return connection status. Call this before starting a session to verify Ableton is reachable.",
        no_params(),
    )]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    connected: bool,
    host: &'a str,
    send_port: u16,
    receive_port: u16,
}

/// Owns `ableton_status`. Never prefixed and never write-guarded.
pub async fn handle(ctx: &ToolContext, name: &str, _args: &serde_json::Value) -> Option<ToolResult> {
    if name != "ableton_status" {
        return None;
    }
    Some(status(ctx).await)
}

async fn status(ctx: &ToolContext) -> ToolResult {
    let session = ctx.session();
    let client = match session.check().await {
        Ok(client) => client,
        Err(err) => return failure(session, &err),
    };

    let status = Status {
        connected: true,
        host: client.host(),
        send_port: client.send_port(),
        receive_port: client.receive_port(),
    };
    match ToolResult::json(&status) {
        Ok(result) => result,
        Err(err) => ToolResult::error(format!("INTERNAL_ERROR: {}", err)),
    }
}

fn failure(session: &OscSession, err: &OscError) -> ToolResult {
    let osc = &session.config().osc;
    tracing::warn!(error = %err, "ableton_status failed");

    let text = match err {
        OscError::Connection { .. } | OscError::ConnectionLost { .. } => format!(
            "CONNECTION_FAILED: Ableton not reachable on port {}. Ensure Ableton Live is running with AbletonOSC.",
            osc.send_port
        ),
        err if err.is_port_in_use() => {
            format!("PORT_CONFLICT: Port {} already in use", osc.receive_port)
        }
        err if err.is_timeout() => format!(
            "TIMEOUT: No response from Ableton within {}ms",
            session.config().health_check_timeout.as_millis()
        ),
        OscError::NotReady | OscError::Closing | OscError::Bind { .. } | OscError::Io(_) => {
            format!("CONNECTION_FAILED: OSC client not ready on port {}", osc.send_port)
        }
        other => format!("INTERNAL_ERROR: {}", other),
    };
    ToolResult::error(text)
}
