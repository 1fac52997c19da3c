// log.rs — Append-only JSONL audit log.
//
// One JSON object per line. Each record carries a monotone `seq` and links
// to its predecessor through `prev_hash`, so inserting, deleting, or
// editing any line is detectable by walking the chain.
//
// The writer state lives behind a Mutex: even if the request loop is ever
// parallelized, appends stay serialized and the seq/chain invariants hold.
// Readers open their own handle and stream lines, tolerating growth.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::record::{AuditEvent, AuditRecord, GENESIS_HASH};

/// Which chain invariant failed during verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChainInvariant {
    /// A line was not a parseable audit record.
    RecordParseable,
    /// Sequence numbers must start at 1 and increase without gaps.
    SeqMonotone,
    /// Every record's entry hash must recompute and link to its predecessor.
    HashChainIntact,
}

impl ChainInvariant {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainInvariant::RecordParseable => "RECORD_PARSEABLE",
            ChainInvariant::SeqMonotone => "SEQ_MONOTONE",
            ChainInvariant::HashChainIntact => "HASH_CHAIN_INTACT",
        }
    }
}

/// The first chain failure found while walking the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainFailure {
    pub invariant: ChainInvariant,
    /// Sequence number of the offending record (line number for unparseable lines).
    pub seq: u64,
    pub detail: String,
}

/// Result of a full chain verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainReport {
    /// Number of records walked before stopping.
    pub entries: u64,
    /// The first failing invariant, or None when the chain verifies.
    pub failure: Option<ChainFailure>,
}

impl ChainReport {
    pub fn ok(&self) -> bool {
        self.failure.is_none()
    }
}

struct WriterState {
    writer: BufWriter<File>,
    next_seq: u64,
    last_hash: String,
}

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    state: Mutex<WriterState>,
    path: PathBuf,
}

impl AuditLog {
    /// Open (or create) an audit log at the given path.
    ///
    /// If the file already exists, the tail is read back to recover the
    /// next sequence number and the last entry hash, so new records chain
    /// correctly across restarts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        let (next_seq, last_hash) = if path.exists() {
            Self::read_tail(&path)?
        } else {
            (1, GENESIS_HASH.to_string())
        };

        // Append mode — existing data is never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            state: Mutex::new(WriterState {
                writer: BufWriter::new(file),
                next_seq,
                last_hash,
            }),
            path,
        })
    }

    /// Append an event to the log, completing it into a full record.
    ///
    /// Assigns `seq` and timestamp, hashes the redacted args/result, links
    /// `prev_hash`, computes `entry_hash`, writes exactly one line, and
    /// flushes to durable storage before returning. Appends from multiple
    /// callers are serialized by the internal lock.
    pub fn append(&self, event: AuditEvent) -> Result<AuditRecord, AuditError> {
        let mut state = self.state.lock().expect("audit log lock poisoned");

        let mut record = AuditRecord {
            seq: state.next_seq,
            ts: Utc::now(),
            session_id: event.session_id.clone(),
            role: event.role.clone(),
            workspace_root: event.workspace_root.clone(),
            tool: event.tool.clone(),
            intent: event.intent.clone(),
            plan_hash: event.plan_hash.clone(),
            phase_id: event.phase_id.clone(),
            args_hash: event.args_hash(),
            result_hash: event.result_hash(),
            error_code: event.error_code.clone(),
            invariant_id: event.invariant_id.clone(),
            notes: event.notes.clone(),
            prev_hash: state.last_hash.clone(),
            entry_hash: String::new(),
        };
        record.entry_hash = record.computed_entry_hash();

        let json = serde_json::to_string(&record)?;
        writeln!(state.writer, "{}", json)?;
        state.writer.flush()?;
        // Flush reaches the OS; sync_data reaches the disk.
        state.writer.get_ref().sync_data()?;

        state.next_seq = record.seq + 1;
        state.last_hash = record.entry_hash.clone();

        tracing::debug!(seq = record.seq, tool = %record.tool, "audit record appended");
        Ok(record)
    }

    /// Read all records from a log file, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str::<AuditRecord>(&line)?);
        }

        Ok(records)
    }

    /// Read records whose `seq` falls in `[lo, hi]` (inclusive).
    pub fn read_range(
        path: impl AsRef<Path>,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(Self::read_all(path)?
            .into_iter()
            .filter(|r| r.seq >= lo && r.seq <= hi)
            .collect())
    }

    /// Walk the whole log, recomputing hashes and continuity.
    ///
    /// Returns a report naming the first failing invariant and the
    /// offending sequence number, or a clean report.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<ChainReport, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut entries: u64 = 0;
        let mut expected_seq: u64 = 1;
        let mut prev_hash = GENESIS_HASH.to_string();

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: AuditRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(err) => {
                    return Ok(ChainReport {
                        entries,
                        failure: Some(ChainFailure {
                            invariant: ChainInvariant::RecordParseable,
                            seq: line_idx as u64 + 1,
                            detail: format!("invalid JSON: {}", err),
                        }),
                    });
                }
            };

            if record.seq != expected_seq {
                return Ok(ChainReport {
                    entries,
                    failure: Some(ChainFailure {
                        invariant: ChainInvariant::SeqMonotone,
                        seq: record.seq,
                        detail: format!("expected seq {}, found {}", expected_seq, record.seq),
                    }),
                });
            }

            if !record.entry_hash_valid() {
                return Ok(ChainReport {
                    entries,
                    failure: Some(ChainFailure {
                        invariant: ChainInvariant::HashChainIntact,
                        seq: record.seq,
                        detail: "entry hash does not recompute".to_string(),
                    }),
                });
            }

            if record.prev_hash != prev_hash {
                return Ok(ChainReport {
                    entries,
                    failure: Some(ChainFailure {
                        invariant: ChainInvariant::HashChainIntact,
                        seq: record.seq,
                        detail: format!(
                            "prev_hash {} does not match prior entry hash {}",
                            record.prev_hash, prev_hash
                        ),
                    }),
                });
            }

            prev_hash = record.entry_hash.clone();
            expected_seq += 1;
            entries += 1;
        }

        Ok(ChainReport {
            entries,
            failure: None,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently in the log.
    pub fn len(&self) -> u64 {
        let state = self.state.lock().expect("audit log lock poisoned");
        state.next_seq - 1
    }

    /// True when the log holds no records yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recover `(next_seq, last_entry_hash)` from an existing log file.
    fn read_tail(path: &Path) -> Result<(u64, String), AuditError> {
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut last: Option<AuditRecord> = None;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            last = Some(serde_json::from_str(&line)?);
        }

        Ok(match last {
            Some(record) => (record.seq + 1, record.entry_hash),
            None => (1, GENESIS_HASH.to_string()),
        })
    }
}
