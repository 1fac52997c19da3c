//! # pw-audit
//!
//! Append-only, hash-chained audit log for Planward.
//!
//! Every governance-relevant tool invocation becomes one [`AuditRecord`]
//! line in `audit-log.jsonl`. Records carry a gap-free sequence number and
//! chain to their predecessor through `prev_hash`, so any insertion,
//! deletion, or edit is detectable by [`AuditLog::verify_chain`]. Sensitive
//! values are replaced by hash markers before storage, keeping replay
//! deterministic without retaining secrets.

mod buffer;
mod error;
pub mod hasher;
mod log;
mod record;
mod redact;

pub use buffer::PreSessionBuffer;
pub use error::AuditError;
pub use log::{AuditLog, ChainFailure, ChainInvariant, ChainReport};
pub use record::{AuditEvent, AuditRecord, GENESIS_HASH};
pub use redact::redact;
