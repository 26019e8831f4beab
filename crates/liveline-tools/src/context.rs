//! State shared by every tool call.

use crate::error::{Result, ToolError};
use crate::live::Live;
use crate::result::ToolResult;
use crate::snapshot::TrackSnapshot;
use liveline_osc::OscSession;
use liveline_samples::SampleLibrary;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connection gatekeeper, sample library, read-only flag and the two-step
/// delete ledger. One per server.
pub struct ToolContext {
    session: Arc<OscSession>,
    samples: Arc<SampleLibrary>,
    read_only: AtomicBool,
    pending_deletes: Mutex<HashMap<i64, TrackSnapshot>>,
}

impl ToolContext {
    pub fn new(session: Arc<OscSession>, samples: Arc<SampleLibrary>) -> Self {
        Self {
            session,
            samples,
            read_only: AtomicBool::new(false),
            pending_deletes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_read_only(self, enabled: bool) -> Self {
        self.set_read_only(enabled);
        self
    }

    pub fn session(&self) -> &Arc<OscSession> {
        &self.session
    }

    pub fn samples(&self) -> &Arc<SampleLibrary> {
        &self.samples
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    pub fn set_read_only(&self, enabled: bool) {
        self.read_only.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Read-only mode changed");
    }

    /// Refuse `tool` while read-only mode is on.
    pub fn guard_write(&self, tool: &str) -> Result<()> {
        if self.is_read_only() {
            tracing::debug!(tool, "Write blocked by read-only mode");
            return Err(ToolError::ReadOnly(tool.to_string()));
        }
        Ok(())
    }

    /// A connected, verified handle to Live.
    pub async fn live(&self) -> Result<Live> {
        let client = self.session.ensure_connected().await?;
        Ok(Live::new(client))
    }

    pub fn set_pending_delete(&self, track_index: i64, snapshot: TrackSnapshot) {
        self.pending_deletes.lock().insert(track_index, snapshot);
    }

    pub fn pending_delete(&self, track_index: i64) -> Option<TrackSnapshot> {
        self.pending_deletes.lock().get(&track_index).cloned()
    }

    pub fn clear_pending_delete(&self, track_index: i64) {
        self.pending_deletes.lock().remove(&track_index);
    }

    pub fn clear_pending_deletes(&self) {
        self.pending_deletes.lock().clear();
    }

    /// Turn a handler outcome into a tool result.
    ///
    /// Errors are prefixed with `prefix`, except read-only refusals which
    /// carry their own code. A connection failure also drops the session's
    /// verified state.
    pub(crate) fn finish(&self, prefix: &str, outcome: Result<ToolResult>) -> ToolResult {
        match outcome {
            Ok(result) => result,
            Err(err @ ToolError::ReadOnly(_)) => ToolResult::error(err.to_string()),
            Err(err) => {
                if err.is_connection_failure() {
                    self.session.mark_unverified();
                }
                tracing::debug!(prefix, error = %err, "Tool call failed");
                ToolResult::error(format!("{}: {}", prefix, err))
            }
        }
    }
}
