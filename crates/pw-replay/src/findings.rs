// findings.rs — The closed finding vocabulary for replay.
//
// Every replay observation maps to one of these codes. The set is closed
// and stable: machine consumers key on the code string, humans read the
// detail. Verdict is PASS iff the finding list is empty.

use serde::{Deserialize, Serialize};

/// What kind of problem replay observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// A record's hash linkage fails to recompute or link.
    TamperBrokenHashChain,
    /// Sequence numbers are not gap-free from 1.
    TamperSeqGap,
    /// A log line is not a parseable record.
    TamperUnparseableRecord,
    /// Two records share (tool, phase, args_hash) but disagree on results.
    DivergenceIdenticalArgsDifferentResults,
    /// A mutating record cites a plan the registry cannot resolve.
    AuthorityPlanNotFound,
    /// A mutating record cites a plan that is not an approved authority.
    AuthorityPlanNotApproved,
    /// A record executed under a phase its plan never declares.
    AuthorityPhaseNotDeclared,
    /// A blocked-by-gate record: policy stopped the operation.
    PolicyBlockedOperation,
    /// A declared plan phase produced no records at all.
    EvidenceGapMissingPhase,
}

impl FindingKind {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::TamperBrokenHashChain => "TAMPER_DETECTED_BROKEN_HASH_CHAIN",
            FindingKind::TamperSeqGap => "TAMPER_DETECTED_SEQ_GAP",
            FindingKind::TamperUnparseableRecord => "TAMPER_DETECTED_UNPARSEABLE_RECORD",
            FindingKind::DivergenceIdenticalArgsDifferentResults => {
                "DIVERGENCE_IDENTICAL_ARGS_DIFFERENT_RESULTS"
            }
            FindingKind::AuthorityPlanNotFound => "AUTHORITY_PLAN_NOT_FOUND",
            FindingKind::AuthorityPlanNotApproved => "AUTHORITY_PLAN_NOT_APPROVED",
            FindingKind::AuthorityPhaseNotDeclared => "AUTHORITY_PHASE_NOT_DECLARED",
            FindingKind::PolicyBlockedOperation => "POLICY_BLOCKED_OPERATION",
            FindingKind::EvidenceGapMissingPhase => "EVIDENCE_GAP_MISSING_PHASE",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One replay finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub kind: FindingKind,
    /// The sequence numbers this finding names (ordered).
    pub seqs: Vec<u64>,
    pub detail: String,
}

impl Finding {
    pub fn new(kind: FindingKind, seqs: Vec<u64>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            seqs,
            detail: detail.into(),
        }
    }
}

/// The verdict of a replay or integrity pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayVerdict {
    /// PASS iff `findings` is empty.
    pub pass: bool,
    pub findings: Vec<Finding>,
    /// How many records the projection considered.
    pub records_considered: u64,
}

impl ReplayVerdict {
    pub fn from_findings(findings: Vec<Finding>, records_considered: u64) -> Self {
        Self {
            pass: findings.is_empty(),
            findings,
            records_considered,
        }
    }
}
