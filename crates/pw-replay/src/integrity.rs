// integrity.rs — Workspace integrity verification.
//
// Read-only walk of the audit log, in the fixed order: workspace root
// valid, audit file exists, every line parses, sequences are monotone and
// gap-free, every entry hash recomputes and links. The report names the
// first failing invariant and the offending sequence number.

use std::path::Path;

use serde::{Deserialize, Serialize};

use pw_audit::{AuditLog, ChainInvariant};

use crate::error::ReplayError;

/// Name of the audit log file at the workspace root.
pub const AUDIT_LOG_FILE: &str = "audit-log.jsonl";

/// The outcome of an integrity pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrityReport {
    pub pass: bool,
    /// Stable invariant code of the first failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failing_invariant: Option<String>,
    /// Sequence (or line) number of the offending record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offending_seq: Option<u64>,
    /// Records verified before stopping.
    pub entries: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntegrityReport {
    fn pass(entries: u64) -> Self {
        Self {
            pass: true,
            first_failing_invariant: None,
            offending_seq: None,
            entries,
            detail: None,
        }
    }

    fn fail(invariant: &str, seq: Option<u64>, entries: u64, detail: impl Into<String>) -> Self {
        Self {
            pass: false,
            first_failing_invariant: Some(invariant.to_string()),
            offending_seq: seq,
            entries,
            detail: Some(detail.into()),
        }
    }
}

/// Verify a workspace's audit integrity. Never mutates anything.
pub fn verify_workspace_integrity(workspace_root: &Path) -> Result<IntegrityReport, ReplayError> {
    if !workspace_root.is_dir() {
        return Ok(IntegrityReport::fail(
            "WORKSPACE_ROOT_VALID",
            None,
            0,
            format!("{} is not a directory", workspace_root.display()),
        ));
    }

    let log_path = workspace_root.join(AUDIT_LOG_FILE);
    if !log_path.exists() {
        return Ok(IntegrityReport::fail(
            "AUDIT_LOG_EXISTS",
            None,
            0,
            format!("no audit log at {}", log_path.display()),
        ));
    }

    let report = AuditLog::verify_chain(&log_path)?;
    Ok(match report.failure {
        None => IntegrityReport::pass(report.entries),
        Some(failure) => {
            let invariant = match failure.invariant {
                ChainInvariant::RecordParseable => "RECORD_PARSEABLE",
                ChainInvariant::SeqMonotone => "SEQ_MONOTONE",
                ChainInvariant::HashChainIntact => "HASH_CHAIN_INTACT",
            };
            IntegrityReport::fail(invariant, Some(failure.seq), report.entries, failure.detail)
        }
    })
}
