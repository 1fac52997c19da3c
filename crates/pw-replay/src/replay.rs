// replay.rs — Read-only reconstruction of "what happened" under a plan.
//
// Projects the audit log onto the records citing a given plan hash
// (optionally narrowed by phase, tool, or seq range) and evaluates the
// closed finding set: tamper, determinism, authority, policy, evidence
// gaps. The engine invokes no tool handler, writes no file, and mutates
// no state — whatever it finds, it only reports.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use pw_audit::{AuditLog, AuditRecord, ChainInvariant};
use pw_plan::{PlanError, PlanRegistry};

use crate::error::ReplayError;
use crate::findings::{Finding, FindingKind, ReplayVerdict};
use crate::integrity::AUDIT_LOG_FILE;

/// Optional narrowing of the projection.
#[derive(Debug, Clone, Default)]
pub struct ReplayFilters {
    pub phase: Option<String>,
    pub tool: Option<String>,
    pub seq_range: Option<(u64, u64)>,
}

impl ReplayFilters {
    fn admits(&self, record: &AuditRecord) -> bool {
        if let Some(phase) = &self.phase {
            if record.phase_id.as_deref() != Some(phase.as_str()) {
                return false;
            }
        }
        if let Some(tool) = &self.tool {
            if &record.tool != tool {
                return false;
            }
        }
        if let Some((lo, hi)) = self.seq_range {
            if record.seq < lo || record.seq > hi {
                return false;
            }
        }
        true
    }
}

fn phase_declaration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^Phase\s+([A-Za-z0-9_.-]+):").unwrap())
}

/// Tools that mutate the working tree and therefore require plan authority.
const MUTATING_TOOLS: &[&str] = &["write_file", "bootstrap"];

/// Error-code prefix marking operations stopped by an admission gate.
const BLOCKED_PREFIX: &str = "POLICY_";

/// Replay the audit history of one plan.
pub fn replay(
    workspace_root: &Path,
    plan_hash: &str,
    filters: &ReplayFilters,
) -> Result<ReplayVerdict, ReplayError> {
    if !workspace_root.is_dir() {
        return Err(ReplayError::WorkspaceInvalid(workspace_root.to_path_buf()));
    }

    let mut findings = Vec::new();

    // Tamper first: a broken chain taints everything downstream.
    let log_path = workspace_root.join(AUDIT_LOG_FILE);
    let records = if log_path.exists() {
        let chain = AuditLog::verify_chain(&log_path)?;
        if let Some(failure) = chain.failure {
            let kind = match failure.invariant {
                ChainInvariant::RecordParseable => FindingKind::TamperUnparseableRecord,
                ChainInvariant::SeqMonotone => FindingKind::TamperSeqGap,
                ChainInvariant::HashChainIntact => FindingKind::TamperBrokenHashChain,
            };
            findings.push(Finding::new(kind, vec![failure.seq], failure.detail));
        }
        match AuditLog::read_all(&log_path) {
            Ok(records) => records,
            // Unparseable content is already a tamper finding; the
            // projection is simply empty.
            Err(_) => Vec::new(),
        }
    } else {
        Vec::new()
    };

    // Project onto this plan, under the filters.
    let projected: Vec<&AuditRecord> = records
        .iter()
        .filter(|r| r.plan_hash.as_deref() == Some(plan_hash))
        .filter(|r| filters.admits(r))
        .collect();

    // Authority: resolve the plan once; per-record findings reference it.
    // The registry is consulted strictly read-only: an unindexed hash is a
    // finding here, never an auto-registration (lookup on an indexed plan
    // touches no state).
    let mut registry = PlanRegistry::load(workspace_root)?;
    let resolution = if registry
        .state()
        .plan_index
        .contains_key(&plan_hash.to_lowercase())
    {
        registry.lookup(plan_hash)
    } else {
        Err(PlanError::NotIndexed(plan_hash.to_string()))
    };
    let plan = match resolution {
        Ok(lookup) => Some(lookup.plan),
        Err(err) => {
            let mutating: Vec<u64> = projected
                .iter()
                .filter(|r| MUTATING_TOOLS.contains(&r.tool.as_str()) && r.error_code.is_none())
                .map(|r| r.seq)
                .collect();
            if !mutating.is_empty() {
                let kind = match &err {
                    PlanError::StatusNotApproved(_) | PlanError::StatusWeakened(_) => {
                        FindingKind::AuthorityPlanNotApproved
                    }
                    _ => FindingKind::AuthorityPlanNotFound,
                };
                findings.push(Finding::new(kind, mutating, err.to_string()));
            }
            None
        }
    };

    // Phase authority and evidence gaps need the declared phase list.
    if let Some(plan) = &plan {
        let declared: Vec<String> = phase_declaration()
            .captures_iter(&plan.content)
            .map(|c| c[1].to_string())
            .collect();

        for record in &projected {
            if let Some(phase) = &record.phase_id {
                if !declared.contains(phase) {
                    findings.push(Finding::new(
                        FindingKind::AuthorityPhaseNotDeclared,
                        vec![record.seq],
                        format!("phase '{}' is not declared by the plan", phase),
                    ));
                }
            }
        }

        // Evidence gaps only make sense over the unfiltered projection.
        if filters.phase.is_none() && filters.tool.is_none() && filters.seq_range.is_none() {
            for phase in &declared {
                let covered = projected
                    .iter()
                    .any(|r| r.phase_id.as_deref() == Some(phase.as_str()));
                if !covered {
                    findings.push(Finding::new(
                        FindingKind::EvidenceGapMissingPhase,
                        Vec::new(),
                        format!("declared phase '{}' produced no records", phase),
                    ));
                }
            }
        }
    }

    // Determinism: identical (tool, phase, args_hash) must agree on results.
    let mut by_inputs: HashMap<(&str, Option<&str>, &str), Vec<&AuditRecord>> = HashMap::new();
    for record in &projected {
        if record.result_hash.is_some() {
            by_inputs
                .entry((
                    record.tool.as_str(),
                    record.phase_id.as_deref(),
                    record.args_hash.as_str(),
                ))
                .or_default()
                .push(record);
        }
    }
    let mut divergences: Vec<Finding> = Vec::new();
    for group in by_inputs.values() {
        for pair in group.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.result_hash != b.result_hash {
                divergences.push(Finding::new(
                    FindingKind::DivergenceIdenticalArgsDifferentResults,
                    vec![a.seq, b.seq],
                    format!(
                        "records {} and {} share tool/phase/args but disagree on results",
                        a.seq, b.seq
                    ),
                ));
            }
        }
    }
    divergences.sort_by_key(|f| f.seqs.clone());
    findings.extend(divergences);

    // Policy: blocked-by-gate records surface as violations, not execution.
    for record in &projected {
        if let Some(code) = &record.error_code {
            if code.starts_with(BLOCKED_PREFIX) {
                findings.push(Finding::new(
                    FindingKind::PolicyBlockedOperation,
                    vec![record.seq],
                    format!("operation blocked by policy ({})", code),
                ));
            }
        }
    }

    tracing::info!(
        plan_hash,
        records = projected.len(),
        findings = findings.len(),
        "replay evaluated"
    );
    Ok(ReplayVerdict::from_findings(
        findings,
        projected.len() as u64,
    ))
}
