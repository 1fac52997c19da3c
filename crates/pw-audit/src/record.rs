// record.rs — Audit record data model.
//
// Every governance-relevant tool invocation — successful or meaningfully
// failed — is recorded as one AuditRecord, one JSON object per line in the
// log. Records are chained: `prev_hash` holds the previous record's
// `entry_hash` (or the genesis constant for seq 1), and `entry_hash` is the
// SHA-256 of the record's canonical serialization with the `entry_hash`
// field removed. Inserting, deleting, or editing any line breaks the chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hasher;
use crate::redact;

/// `prev_hash` of the first record in a log.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Monotone sequence number, starting at 1, no gaps.
    pub seq: u64,

    /// When this record was appended (UTC).
    pub ts: DateTime<Utc>,

    /// Session that produced the event.
    pub session_id: String,

    /// Role active in that session ("planner" / "executor").
    pub role: String,

    /// The locked workspace root at append time.
    pub workspace_root: String,

    /// Which tool ran (e.g. "write_file", "bootstrap", "replay").
    pub tool: String,

    /// What the call was trying to do (e.g. "write", "bootstrap_noop").
    pub intent: String,

    /// Plan cited by the operation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,

    /// Plan phase the operation executed under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<String>,

    /// SHA-256 over the canonical, redacted request arguments.
    pub args_hash: String,

    /// SHA-256 over the canonical, redacted result. Absent for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_hash: Option<String>,

    /// Stable error code when the operation failed a gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Invariant identifier associated with the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariant_id: Option<String>,

    /// Free-form operator notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// `entry_hash` of the previous record, or [`GENESIS_HASH`] for seq 1.
    pub prev_hash: String,

    /// SHA-256 of this record's canonical serialization minus this field.
    pub entry_hash: String,
}

impl AuditRecord {
    /// Recompute what this record's `entry_hash` should be.
    pub fn computed_entry_hash(&self) -> String {
        let mut value = serde_json::to_value(self).expect("record serialization");
        if let Value::Object(ref mut map) = value {
            map.remove("entry_hash");
        }
        hasher::hash_canonical(&value)
    }

    /// True when the stored `entry_hash` matches the recomputation.
    pub fn entry_hash_valid(&self) -> bool {
        self.entry_hash == self.computed_entry_hash()
    }
}

/// A not-yet-appended audit event.
///
/// The log completes it into an [`AuditRecord`] on append: assigns `seq` and
/// `ts`, hashes the redacted args/result, links `prev_hash`, and computes
/// `entry_hash`. Built with the usual chaining builder:
///
///   `AuditEvent::new("write_file", "write").with_plan(hash).with_args(args)`
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub session_id: String,
    pub role: String,
    pub workspace_root: String,
    pub tool: String,
    pub intent: String,
    pub plan_hash: Option<String>,
    pub phase_id: Option<String>,
    pub args: Value,
    pub result: Value,
    pub error_code: Option<String>,
    pub invariant_id: Option<String>,
    pub notes: Option<String>,
}

impl AuditEvent {
    /// Create a new event for a tool invocation. Session fields start empty —
    /// the gateway stamps them before append.
    pub fn new(tool: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            session_id: String::new(),
            role: String::new(),
            workspace_root: String::new(),
            tool: tool.into(),
            intent: intent.into(),
            plan_hash: None,
            phase_id: None,
            args: Value::Null,
            result: Value::Null,
            error_code: None,
            invariant_id: None,
            notes: None,
        }
    }

    /// Stamp the session context onto the event.
    pub fn with_session(
        mut self,
        session_id: impl Into<String>,
        role: impl Into<String>,
        workspace_root: impl Into<String>,
    ) -> Self {
        self.session_id = session_id.into();
        self.role = role.into();
        self.workspace_root = workspace_root.into();
        self
    }

    /// Set the cited plan hash.
    pub fn with_plan(mut self, plan_hash: impl Into<String>) -> Self {
        self.plan_hash = Some(plan_hash.into());
        self
    }

    /// Set the plan phase.
    pub fn with_phase(mut self, phase_id: impl Into<String>) -> Self {
        self.phase_id = Some(phase_id.into());
        self
    }

    /// Set the request arguments (redacted before hashing).
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Set the result value (redacted before hashing).
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    /// Mark the event as a failed operation.
    pub fn with_error(
        mut self,
        code: impl Into<String>,
        invariant_id: Option<String>,
    ) -> Self {
        self.error_code = Some(code.into());
        self.invariant_id = invariant_id;
        self
    }

    /// Attach operator notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Hash of the redacted argument form. Deterministic for replay.
    pub fn args_hash(&self) -> String {
        hasher::hash_canonical(&redact::redact(self.args.clone()))
    }

    /// Hash of the redacted result form, absent when there is no result.
    pub fn result_hash(&self) -> Option<String> {
        if self.result.is_null() {
            None
        } else {
            Some(hasher::hash_canonical(&redact::redact(self.result.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> AuditRecord {
        let mut record = AuditRecord {
            seq: 1,
            ts: "2026-03-01T12:00:00Z".parse().unwrap(),
            session_id: "s-1".into(),
            role: "executor".into(),
            workspace_root: "/tmp/ws".into(),
            tool: "write_file".into(),
            intent: "write".into(),
            plan_hash: Some("abc".into()),
            phase_id: None,
            args_hash: hasher::hash_str("{}"),
            result_hash: None,
            error_code: None,
            invariant_id: None,
            notes: None,
            prev_hash: GENESIS_HASH.into(),
            entry_hash: String::new(),
        };
        record.entry_hash = record.computed_entry_hash();
        record
    }

    #[test]
    fn record_serialization_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let restored: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn entry_hash_validates_after_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let restored: AuditRecord = serde_json::from_str(&json).unwrap();
        assert!(restored.entry_hash_valid());
    }

    #[test]
    fn entry_hash_detects_field_edits() {
        let mut record = sample_record();
        record.tool = "edited".into();
        assert!(!record.entry_hash_valid());
    }

    #[test]
    fn entry_hash_ignores_its_own_field() {
        // Recomputation must not feed entry_hash back into itself.
        let mut record = sample_record();
        let expected = record.computed_entry_hash();
        record.entry_hash = "garbage".into();
        assert_eq!(record.computed_entry_hash(), expected);
    }

    #[test]
    fn event_args_hash_is_deterministic() {
        let e1 = AuditEvent::new("write_file", "write").with_args(json!({"path": "a.txt"}));
        let e2 = AuditEvent::new("write_file", "write").with_args(json!({"path": "a.txt"}));
        assert_eq!(e1.args_hash(), e2.args_hash());
    }

    #[test]
    fn null_result_has_no_hash() {
        let event = AuditEvent::new("write_file", "write");
        assert!(event.result_hash().is_none());
    }

    #[test]
    fn genesis_hash_is_64_zeros() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }
}
