// error.rs — Gateway errors and the external error envelope.
//
// Every gate fails closed, and the first failure is converted here into
// the one shape callers see: a stable code from the closed taxonomy, a
// human message, the phase that rejected, an optional invariant id, and
// an optional cause chain. No internal stack traces cross the boundary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pw_audit::AuditError;
use pw_path::PathError;
use pw_plan::PlanError;
use pw_policy::Violation;
use pw_preflight::{PreflightError, PreflightReport, PreflightStatus};
use pw_session::SessionError;

/// Which part of the pipeline rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorPhase {
    Session,
    Path,
    Plan,
    Policy,
    Write,
    Preflight,
    Audit,
}

/// The structured error shape exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    /// Stable code from the closed taxonomy.
    pub code: String,
    pub message: String,
    pub phase: ErrorPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariant_id: Option<String>,
    /// Offending (line, construct) pairs for policy rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
    /// Captured output for preflight rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight: Option<PreflightReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Errors raised anywhere in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request shape (G1).
    #[error("invalid request: {0}")]
    Schema(String),

    /// Session subsystem rejection.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// `begin_session` received an unusable workspace root.
    #[error("invalid workspace root: {0}")]
    InvalidRoot(PathBuf),

    /// Path authority rejection.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Plan registry / bootstrap rejection.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Content policy rejection, with the full ordered violation list.
    #[error("content policy rejected the write with {} violation(s)", .0.len())]
    Policy(Vec<Violation>),

    /// A patch hunk failed to apply (G4).
    #[error("patch does not apply: {0}")]
    PatchFailed(String),

    /// The caller's concurrency precondition failed (G3).
    #[error("previous-hash mismatch: expected {expected}, found {actual}")]
    PreviousHashMismatch { expected: String, actual: String },

    /// The role header was invalid or incompatible with the artifact (G6).
    #[error("role header invalid: {0}")]
    RoleHeaderInvalid(String),

    /// The atomic commit failed (G8).
    #[error("atomic rename failed at {path}: {source}")]
    AtomicRenameFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Preflight ran and rejected the tree (G9); the write was reverted.
    #[error("preflight {}", preflight_summary(.0))]
    PreflightRejected(PreflightReport),

    /// Preflight could not run at all.
    #[error(transparent)]
    PreflightRun(#[from] PreflightError),

    /// Audit subsystem failure; the operation was rolled back.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Filesystem failure outside the atomic commit.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Replay errors fold into the existing taxonomy: an unusable root is a
/// session-root problem, the rest are audit/plan subsystem failures.
impl From<pw_replay::ReplayError> for GatewayError {
    fn from(err: pw_replay::ReplayError) -> Self {
        match err {
            pw_replay::ReplayError::WorkspaceInvalid(path) => GatewayError::InvalidRoot(path),
            pw_replay::ReplayError::Audit(inner) => GatewayError::Audit(inner),
            pw_replay::ReplayError::Plan(inner) => GatewayError::Plan(inner),
        }
    }
}

fn preflight_summary(report: &PreflightReport) -> String {
    match &report.status {
        PreflightStatus::TimedOut => "timed out".to_string(),
        PreflightStatus::Failed { exit_code } => {
            format!("failed with exit code {}", exit_code)
        }
        _ => "failed".to_string(),
    }
}

impl GatewayError {
    /// Stable code from the closed taxonomy.
    pub fn code(&self) -> String {
        match self {
            GatewayError::Schema(_) => "SCHEMA_INVALID".into(),
            GatewayError::Session(err) => match err {
                SessionError::NotInitialized => "SESSION_NOT_INITIALIZED".into(),
                SessionError::AlreadyInitialized(_) => "SESSION_ALREADY_INITIALIZED".into(),
                SessionError::UnknownRole(_) => "SESSION_INVALID_ROLE".into(),
                SessionError::PromptGateLocked => "SESSION_PROMPT_GATE_LOCKED".into(),
                SessionError::UnknownPrompt { .. } => "SESSION_UNKNOWN_PROMPT".into(),
                SessionError::RoleForbidden { .. } => "SESSION_ROLE_FORBIDDEN".into(),
            },
            GatewayError::InvalidRoot(_) => "SESSION_INVALID_ROOT".into(),
            GatewayError::Path(err) => match err {
                PathError::RootNotAbsolute(_) | PathError::RootNotDirectory(_) => {
                    "SESSION_INVALID_ROOT".into()
                }
                PathError::EmptyPath => "PATH_EMPTY".into(),
                PathError::Traversal(_) => "PATH_TRAVERSAL".into(),
                PathError::OutsideRoot(_) => "PATH_OUTSIDE_ROOT".into(),
                PathError::SymlinkEscape(_) => "PATH_SYMLINK_ESCAPE".into(),
                PathError::NotFound(_) => "PATH_NOT_FOUND".into(),
                PathError::Io { .. } => "PATH_IO".into(),
            },
            GatewayError::Plan(err) => err.code().into(),
            GatewayError::Policy(violations) => {
                if violations.iter().any(|v| v.code.is_hard_block()) {
                    "POLICY_HARD_BLOCK".into()
                } else if violations
                    .iter()
                    .any(|v| v.code == pw_policy::ConstructCode::UnparseableSource)
                {
                    "POLICY_UNPARSEABLE".into()
                } else {
                    "POLICY_STRUCTURAL".into()
                }
            }
            GatewayError::PatchFailed(_) => "WRITE_PATCH_FAILED".into(),
            GatewayError::PreviousHashMismatch { .. } => "WRITE_PREVIOUS_HASH_MISMATCH".into(),
            GatewayError::RoleHeaderInvalid(_) => "WRITE_ROLE_HEADER_INVALID".into(),
            GatewayError::AtomicRenameFailed { .. } => "WRITE_ATOMIC_RENAME_FAILED".into(),
            GatewayError::PreflightRejected(report) => match report.status {
                PreflightStatus::TimedOut => "PREFLIGHT_TIMEOUT".into(),
                _ => "PREFLIGHT_FAILED".into(),
            },
            GatewayError::PreflightRun(_) => "PREFLIGHT_FAILED".into(),
            GatewayError::Audit(err) => match err {
                AuditError::ChainBroken { .. } => "AUDIT_CHAIN_BROKEN".into(),
                AuditError::SeqGap { .. } => "AUDIT_SEQ_GAP".into(),
                _ => "AUDIT_APPEND_FAILED".into(),
            },
            GatewayError::Io { .. } => "WRITE_IO".into(),
        }
    }

    /// Which phase of the pipeline this error belongs to.
    pub fn phase(&self) -> ErrorPhase {
        match self {
            GatewayError::Schema(_) | GatewayError::Session(_) | GatewayError::InvalidRoot(_) => {
                ErrorPhase::Session
            }
            GatewayError::Path(_) => ErrorPhase::Path,
            GatewayError::Plan(_) => ErrorPhase::Plan,
            GatewayError::Policy(_) => ErrorPhase::Policy,
            GatewayError::PatchFailed(_)
            | GatewayError::PreviousHashMismatch { .. }
            | GatewayError::RoleHeaderInvalid(_)
            | GatewayError::AtomicRenameFailed { .. }
            | GatewayError::Io { .. } => ErrorPhase::Write,
            GatewayError::PreflightRejected(_) | GatewayError::PreflightRun(_) => {
                ErrorPhase::Preflight
            }
            GatewayError::Audit(_) => ErrorPhase::Audit,
        }
    }

    /// Invariant identifier, where one names the failure precisely.
    pub fn invariant_id(&self) -> Option<String> {
        match self {
            GatewayError::Policy(violations) => {
                violations.first().map(|v| v.code.as_str().to_string())
            }
            GatewayError::PreviousHashMismatch { .. } => Some("CONCURRENT_MODIFICATION".into()),
            GatewayError::Audit(AuditError::ChainBroken { .. }) => {
                Some("HASH_CHAIN_INTACT".into())
            }
            _ => None,
        }
    }

    /// Convert into the external envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        let violations = match self {
            GatewayError::Policy(violations) => Some(violations.clone()),
            GatewayError::Plan(PlanError::LintFailed(violations)) => Some(violations.clone()),
            _ => None,
        };
        let preflight = match self {
            GatewayError::PreflightRejected(report) => Some(report.clone()),
            _ => None,
        };
        let cause = std::error::Error::source(self).map(|s| s.to_string());
        ErrorEnvelope {
            code: self.code(),
            message: self.to_string(),
            phase: self.phase(),
            invariant_id: self.invariant_id(),
            violations,
            preflight,
            cause,
        }
    }
}
