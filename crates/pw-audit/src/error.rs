// error.rs — Error types for the audit subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the audit log file.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a record to the log. The owning operation must
    /// treat this as fatal — the log never contains partial records.
    #[error("failed to append audit record: {0}")]
    AppendFailed(#[from] std::io::Error),

    /// Failed to serialize or deserialize a record (malformed JSON).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hash chain is broken at the given sequence number.
    #[error("tamper detected: broken hash chain at seq {seq}: {detail}")]
    ChainBroken { seq: u64, detail: String },

    /// Sequence numbers are not monotone and gap-free.
    #[error("tamper detected: sequence gap at seq {seq} (expected {expected})")]
    SeqGap { seq: u64, expected: u64 },

    /// Failed to read a file for hashing.
    #[error("failed to hash file at {path}: {source}")]
    HashFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
