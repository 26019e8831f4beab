//! Tool registry: every definition plus name-based dispatch.

use crate::context::ToolContext;
use crate::result::{ToolDefinition, ToolResult};
use crate::tools::{clip, device, health, mixer, sample, scene, session, settings, track, transport};
use std::collections::HashSet;
use std::sync::Arc;

/// Cheap to clone; clones share the context.
#[derive(Clone)]
pub struct ToolRegistry {
    ctx: Arc<ToolContext>,
    definitions: Arc<Vec<ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let groups = [
            health::definitions(),
            transport::definitions(),
            mixer::definitions(),
            track::definitions(),
            scene::definitions(),
            clip::definitions(),
            device::definitions(),
            session::definitions(),
            sample::definitions(),
            settings::definitions(),
        ];

        let mut seen = HashSet::new();
        let mut definitions = Vec::new();
        for def in groups.into_iter().flatten() {
            if !seen.insert(def.name.clone()) {
                tracing::warn!(tool = %def.name, "Duplicate tool definition ignored");
                continue;
            }
            definitions.push(def);
        }
        tracing::debug!(count = definitions.len(), "Tool registry built");

        Self {
            ctx,
            definitions: Arc::new(definitions),
        }
    }

    pub fn context(&self) -> &Arc<ToolContext> {
        &self.ctx
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name)
    }

    /// Route a call to the module that owns `name`.
    ///
    /// Failures come back as error results, never as `Err`.
    pub async fn call(&self, name: &str, args: &serde_json::Value) -> ToolResult {
        let ctx = self.ctx.as_ref();
        tracing::debug!(tool = name, "Tool call");

        if let Some(result) = health::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = transport::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = mixer::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = track::handle(ctx, name, args).await {
            return result;
        }
        // scenes also own clip_launch and clip_stop, so they go before clips
        if let Some(result) = scene::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = clip::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = device::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = session::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = sample::handle(ctx, name, args).await {
            return result;
        }
        if let Some(result) = settings::handle(ctx, name, args).await {
            return result;
        }

        tracing::warn!(tool = name, "Unknown tool");
        ToolResult::error(format!("UNKNOWN_TOOL: No handler for tool '{}'", name))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.definitions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveline_osc::{OscSession, SessionConfig};
    use liveline_samples::SampleLibrary;

    fn registry() -> ToolRegistry {
        let ctx = ToolContext::new(
            Arc::new(OscSession::new(SessionConfig::default())),
            Arc::new(SampleLibrary::default()),
        );
        ToolRegistry::new(Arc::new(ctx))
    }

    #[test]
    fn test_definitions_are_unique_and_complete() {
        let registry = registry();
        let names: HashSet<_> = registry.definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), registry.definitions().len());

        for name in [
            "ableton_status",
            "transport_set_tempo",
            "mixer_set_send",
            "track_delete",
            "scene_list",
            "clip_launch",
            "clip_set_loop",
            "device_load",
            "session_stats",
            "sample_load",
            "set_read_only",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_every_schema_is_an_object() {
        for def in registry().definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
            assert!(def.input_schema["properties"].is_object(), "{}", def.name);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = registry().call("nope", &serde_json::Value::Null).await;
        assert!(result.is_error);
        assert_eq!(result.first_text(), "UNKNOWN_TOOL: No handler for tool 'nope'");
    }

    #[tokio::test]
    async fn test_read_only_blocks_before_connecting() {
        let registry = registry();
        registry.context().set_read_only(true);
        let result = registry
            .call("transport_play", &serde_json::Value::Null)
            .await;
        assert!(result.is_error);
        assert!(result.first_text().starts_with("READ_ONLY: Tool \"transport_play\""));
    }
}
