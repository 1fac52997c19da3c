// error.rs — Error types for the replay engine.
//
// Findings are not errors: a tampered log produces a failing verdict, not
// an Err. Errors here mean the engine could not run at all.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a replay or integrity pass from running.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The workspace root is not an existing directory.
    #[error("workspace root is not an existing directory: {0}")]
    WorkspaceInvalid(PathBuf),

    /// The audit subsystem failed (I/O, not tamper).
    #[error("audit error: {0}")]
    Audit(#[from] pw_audit::AuditError),

    /// The plan registry failed to load.
    #[error("plan error: {0}")]
    Plan(#[from] pw_plan::PlanError),
}
