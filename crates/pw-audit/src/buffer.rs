// buffer.rs — In-memory buffer for pre-session audit events.
//
// Tool calls can arrive before `begin_session` locks a workspace (the
// initialization call itself, early rejections). Those events are retained
// here in arrival order, keyed by the workspace root the caller named. On
// successful initialization the buffer for that root is flushed into the
// persisted log; on failed initialization it is discarded.

use std::collections::HashMap;

use crate::error::AuditError;
use crate::log::AuditLog;
use crate::record::AuditEvent;

/// Arrival-ordered event buffer keyed by workspace root.
#[derive(Debug, Default)]
pub struct PreSessionBuffer {
    events: HashMap<String, Vec<AuditEvent>>,
}

impl PreSessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an event for the given workspace root.
    pub fn push(&mut self, workspace_root: impl Into<String>, event: AuditEvent) {
        self.events.entry(workspace_root.into()).or_default().push(event);
    }

    /// Number of buffered events for a root.
    pub fn len(&self, workspace_root: &str) -> usize {
        self.events.get(workspace_root).map_or(0, Vec::len)
    }

    /// True when nothing is buffered for the root.
    pub fn is_empty(&self, workspace_root: &str) -> bool {
        self.len(workspace_root) == 0
    }

    /// Flush buffered events for a root into the log, preserving order.
    ///
    /// Consumes the buffer for that root. The first append failure aborts
    /// the flush — the remaining events stay dropped with the error, since
    /// a half-initialized session cannot continue anyway.
    pub fn flush_into(
        &mut self,
        workspace_root: &str,
        log: &AuditLog,
    ) -> Result<usize, AuditError> {
        let events = self.events.remove(workspace_root).unwrap_or_default();
        let count = events.len();
        for event in events {
            log.append(event)?;
        }
        tracing::debug!(workspace_root, count, "pre-session buffer flushed");
        Ok(count)
    }

    /// Discard buffered events for a root (failed initialization).
    pub fn discard(&mut self, workspace_root: &str) -> usize {
        self.events.remove(workspace_root).map_or(0, |v| v.len())
    }
}
