//! # pw-replay
//!
//! Read-only replay and integrity verification for Planward.
//!
//! [`verify_workspace_integrity`] walks the audit log recomputing hashes
//! and continuity, naming the first failing invariant.
//! [`replay`] projects the log onto one plan's records and evaluates the
//! closed finding set — tamper, determinism divergence, authority, policy
//! blocks, evidence gaps. Neither ever invokes a tool handler, writes a
//! file, or mutates any state.

mod error;
mod findings;
mod integrity;
mod replay;

pub use error::ReplayError;
pub use findings::{Finding, FindingKind, ReplayVerdict};
pub use integrity::{verify_workspace_integrity, IntegrityReport, AUDIT_LOG_FILE};
pub use replay::{replay, ReplayFilters};
