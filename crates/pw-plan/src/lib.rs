//! # pw-plan
//!
//! Content-addressed plan registry and governance state for Planward.
//!
//! A plan is an immutable text document whose identity is the SHA-256 of
//! its entire content; the canonical filename is `docs/plans/<hash>.md`.
//! The registry answers "is this hash a current authority, and what scope
//! does it grant?", reconciles index against disk, and owns the single-use
//! HMAC-authenticated bootstrap channel through which the first approved
//! plan enters an empty registry.

mod bootstrap;
mod error;
mod header;
mod registry;

pub use bootstrap::{
    bootstrap_at, bootstrap_foundation_plan, BootstrapOutcome, BootstrapPayload, BootstrapSecret,
    FRESHNESS_WINDOW_SECS, SECRET_FILE,
};
pub use error::PlanError;
pub use header::{Plan, PlanHeader, STATUS_APPROVED};
pub use registry::{
    GovernanceState, PlanIndexEntry, PlanLookup, PlanRegistry, ReconcileReport, GOVERNANCE_DIR,
    PLANS_DIR, ROOT_MARKER, STATE_FILE,
};
