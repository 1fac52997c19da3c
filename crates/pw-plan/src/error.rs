// error.rs — Error types for the plan registry and bootstrap.
//
// Lookup misses are structured: the caller learns whether to pick a
// different plan, fix a status, or correct a scope — never a generic
// authorization failure.

use std::path::PathBuf;
use thiserror::Error;

use pw_policy::Violation;

/// Errors that can occur across plan parsing, registry, and bootstrap.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan reference is not in the registry index.
    #[error("plan {0} is not indexed")]
    NotIndexed(String),

    /// The registry index names a file that no longer exists.
    #[error("plan {hash} file missing at {path}")]
    FileMissing { hash: String, path: PathBuf },

    /// The plan file's recomputed hash does not match its filename/index key.
    #[error("plan hash mismatch: expected {expected}, recomputed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The plan header does not literally declare APPROVED.
    #[error("plan status is '{0}', not APPROVED")]
    StatusNotApproved(String),

    /// An indexed-as-approved plan no longer declares APPROVED on disk.
    #[error("plan {0} status weakened on disk")]
    StatusWeakened(String),

    /// The target path is not within the plan's declared scope.
    #[error("path '{path}' is outside the plan's declared scope")]
    OutOfScope { path: String },

    /// The plan header is missing or malformed.
    #[error("plan header invalid: {0}")]
    HeaderInvalid(String),

    /// A required header field is absent.
    #[error("plan header missing required field {0}")]
    HeaderFieldMissing(&'static str),

    /// The header declares a plan hash that does not match the content.
    #[error("declared plan hash {declared} does not match content hash {actual}")]
    DeclaredHashMismatch { declared: String, actual: String },

    /// The plan content failed the plan linter.
    #[error("plan lint failed with {} violation(s)", .0.len())]
    LintFailed(Vec<Violation>),

    /// Bootstrap is disabled (already completed, or explicitly off).
    #[error("bootstrap is disabled for this workspace")]
    BootstrapDisabled,

    /// The bootstrap payload timestamp fell outside the freshness window.
    #[error("bootstrap payload expired (older than {0} seconds)")]
    BootstrapExpired(i64),

    /// The bootstrap signature failed constant-time verification.
    #[error("bootstrap signature invalid")]
    BootstrapSignatureInvalid,

    /// No bootstrap secret is configured.
    #[error("no bootstrap secret configured (env or {0})")]
    SecretMissing(PathBuf),

    /// The registry would transition from empty outside the bootstrap channel.
    #[error("registry is empty: the first plan must arrive via bootstrap")]
    RegistryEmpty,

    /// An underlying filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize governance state.
    #[error("governance state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlanError {
    /// Stable machine-readable code for the error envelope and audit log.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::NotIndexed(_) => "PLAN_NOT_FOUND",
            PlanError::FileMissing { .. } => "PLAN_BROKEN_REFERENCE",
            PlanError::HashMismatch { .. } => "PLAN_HASH_MISMATCH",
            PlanError::StatusNotApproved(_) => "PLAN_STATUS_NOT_APPROVED",
            PlanError::StatusWeakened(_) => "PLAN_STATUS_NOT_APPROVED",
            PlanError::OutOfScope { .. } => "PLAN_OUT_OF_SCOPE",
            PlanError::HeaderInvalid(_) => "PLAN_LINT_FAILED",
            PlanError::HeaderFieldMissing(_) => "PLAN_LINT_FAILED",
            PlanError::DeclaredHashMismatch { .. } => "PLAN_HASH_MISMATCH",
            PlanError::LintFailed(_) => "PLAN_LINT_FAILED",
            PlanError::BootstrapDisabled => "PLAN_BOOTSTRAP_DISABLED",
            PlanError::BootstrapExpired(_) => "PLAN_BOOTSTRAP_EXPIRED",
            PlanError::BootstrapSignatureInvalid => "PLAN_BOOTSTRAP_SIGNATURE_INVALID",
            PlanError::SecretMissing(_) => "PLAN_BOOTSTRAP_SIGNATURE_INVALID",
            PlanError::RegistryEmpty => "PLAN_BOOTSTRAP_DISABLED",
            PlanError::Io { .. } => "PLAN_IO",
            PlanError::Serialization(_) => "PLAN_IO",
        }
    }
}
