// pipeline.rs — The write gate: G1 through G10.
//
// A linear sequence of gates, each with explicit rollback, enforcing the
// union of every invariant the core owns. Failures in G1–G7 leave the
// filesystem untouched because nothing has been written yet. G8 commits
// with an atomic sibling-temp rename while holding the pre-image; a G9
// (preflight) or G10 (audit) failure restores it deterministically. G10
// is the last commit point — after the audit record lands, the operation
// has happened.
//
// The pipeline is deliberately branch-local: every gate returns Result,
// the first error wins, and the caller converts it to the external
// envelope.

use std::fs;
use std::path::Path;

use serde_json::json;

use pw_audit::{hasher, AuditEvent, AuditLog};
use pw_path::PathAuthority;
use pw_plan::PlanRegistry;
use pw_policy::ContentPolicy;
use pw_preflight::{PreflightConfig, PreflightReport, PreflightStatus};
use pw_session::Session;

use crate::error::GatewayError;
use crate::materialized::MaterializedWrite;
use crate::patch;
use crate::role_header::{self, RoleMeta};

/// A mutation request, as it arrives from the tool surface.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub path: String,
    /// Full content, mutually exclusive with `patch`.
    pub content: Option<String>,
    /// Unified diff against current content, mutually exclusive with `content`.
    pub patch: Option<String>,
    /// Hash of the approved plan authorizing this write.
    pub plan: String,
    /// Plan phase this write executes under.
    pub phase: Option<String>,
    /// Concurrency precondition: expected hash of current disk content.
    pub previous_hash: Option<String>,
    /// Optional role-metadata fields for header synthesis.
    pub role_meta: Option<RoleMeta>,
}

/// What a successful admission produced.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub path: String,
    pub plan_hash: String,
    pub role: String,
    pub content_hash: String,
    pub preflight: PreflightReport,
    pub audit_seq: u64,
}

/// Everything the pipeline borrows from the gateway for one admission.
pub struct PipelineContext<'a> {
    pub session: &'a Session,
    pub authority: &'a PathAuthority,
    pub registry: &'a mut PlanRegistry,
    pub policy: &'a ContentPolicy,
    pub preflight: Option<&'a PreflightConfig>,
    pub audit: &'a AuditLog,
}

/// Run a write request through every gate.
pub fn admit(
    ctx: &mut PipelineContext<'_>,
    request: &WriteRequest,
) -> Result<WriteOutcome, GatewayError> {
    // ── G1: schema & session ─────────────────────────────────────
    ctx.session.require_write_authority()?;
    match (&request.content, &request.patch) {
        (Some(_), Some(_)) => {
            return Err(GatewayError::Schema(
                "supply either content or patch, not both".into(),
            ))
        }
        (None, None) => {
            return Err(GatewayError::Schema(
                "supply content or patch".into(),
            ))
        }
        _ => {}
    }
    if request.plan.trim().is_empty() {
        return Err(GatewayError::Schema("plan reference is required".into()));
    }

    // ── G2: path authority ───────────────────────────────────────
    let absolute = ctx.authority.resolve_write(&request.path)?;
    let relative = absolute
        .strip_prefix(ctx.authority.root())
        .expect("resolved path is under the root")
        .to_string_lossy()
        .replace('\\', "/");

    // ── G3: concurrency precondition ─────────────────────────────
    if let Some(expected) = &request.previous_hash {
        let actual = if absolute.exists() {
            let bytes = fs::read(&absolute).map_err(|source| GatewayError::Io {
                path: absolute.clone(),
                source,
            })?;
            hasher::hash_bytes(&bytes)
        } else {
            "<missing>".to_string()
        };
        if &actual != expected {
            return Err(GatewayError::PreviousHashMismatch {
                expected: expected.clone(),
                actual,
            });
        }
    }

    // ── G4: materialize content ──────────────────────────────────
    let pre_image = if absolute.exists() {
        Some(fs::read(&absolute).map_err(|source| GatewayError::Io {
            path: absolute.clone(),
            source,
        })?)
    } else {
        None
    };
    let mut content = match (&request.content, &request.patch) {
        (Some(content), None) => content.clone(),
        (None, Some(diff)) => {
            let current = pre_image
                .as_deref()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            patch::apply_patch(&current, diff)?
        }
        _ => unreachable!("G1 enforced exactly one of content/patch"),
    };

    // ── G5: plan authority ───────────────────────────────────────
    let lookup = ctx.registry.lookup(&request.plan)?;
    if !lookup.plan.header.authorizes_path(&relative) {
        return Err(GatewayError::Plan(pw_plan::PlanError::OutOfScope {
            path: relative,
        }));
    }

    // ── G6: role-header synthesis ────────────────────────────────
    if let Some(meta) = &request.role_meta {
        content = role_header::synthesize(&relative, &content, meta)?;
    }

    // ── G7: content policy ───────────────────────────────────────
    ctx.policy
        .check(&relative, &content, &lookup.plan.header.allowance_set())
        .map_err(GatewayError::Policy)?;

    let write = MaterializedWrite {
        relative_path: relative,
        absolute_path: absolute,
        content,
        pre_image,
    };

    // ── G8: commit filesystem ────────────────────────────────────
    commit(ctx.authority, &write)?;
    tracing::debug!(path = %write.relative_path, "content committed, pre-image held");

    // ── G9: preflight ────────────────────────────────────────────
    let report = match pw_preflight::run(ctx.authority.root(), ctx.preflight) {
        Ok(report) if report.status.is_acceptable() => report,
        Ok(report) => {
            revert(&write);
            return Err(GatewayError::PreflightRejected(report));
        }
        Err(err) => {
            revert(&write);
            return Err(GatewayError::PreflightRun(err));
        }
    };

    // ── G10: audit commit ────────────────────────────────────────
    let content_hash = hasher::hash_str(&write.content);
    let mut event = AuditEvent::new("write_file", "write")
        .with_session(
            ctx.session.session_id.to_string(),
            ctx.session.role.to_string(),
            ctx.authority.root().display().to_string(),
        )
        .with_plan(lookup.plan.hash.clone())
        .with_args(json!({
            "path": write.relative_path,
            "plan": lookup.plan.hash,
            "phase": request.phase,
            "content_sha256": content_hash,
            "previous_hash": request.previous_hash,
        }))
        .with_result(json!({
            "content_hash": content_hash,
            "preflight": status_label(&report.status),
        }));
    if let Some(phase) = &request.phase {
        event = event.with_phase(phase.clone());
    }

    let record = match ctx.audit.append(event) {
        Ok(record) => record,
        Err(err) => {
            // The operation is considered to have never happened.
            revert(&write);
            return Err(GatewayError::Audit(err));
        }
    };

    tracing::info!(
        path = %write.relative_path,
        plan = %lookup.plan.hash,
        seq = record.seq,
        "write admitted"
    );
    Ok(WriteOutcome {
        path: write.relative_path,
        plan_hash: lookup.plan.hash,
        role: ctx.session.role.to_string(),
        content_hash,
        preflight: report,
        audit_seq: record.seq,
    })
}

/// Create-or-replace via a sibling temp file and atomic rename, so readers
/// never observe a half-written file.
fn commit(authority: &PathAuthority, write: &MaterializedWrite) -> Result<(), GatewayError> {
    authority.ensure_dir(&write.absolute_path)?;
    let temp = sibling_temp(&write.absolute_path);
    fs::write(&temp, &write.content).map_err(|source| GatewayError::Io {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, &write.absolute_path).map_err(|source| {
        let _ = fs::remove_file(&temp);
        GatewayError::AtomicRenameFailed {
            path: write.absolute_path.clone(),
            source,
        }
    })
}

/// Deterministic restore of the pre-image: rewrite what was there, or
/// remove the file if it was newly created. Revert failures can only be
/// logged — the pipeline is already unwinding.
fn revert(write: &MaterializedWrite) {
    match &write.pre_image {
        Some(bytes) => {
            let temp = sibling_temp(&write.absolute_path);
            if fs::write(&temp, bytes).is_ok() {
                if let Err(err) = fs::rename(&temp, &write.absolute_path) {
                    tracing::error!(path = %write.absolute_path.display(), %err, "revert rename failed");
                }
            } else {
                tracing::error!(path = %write.absolute_path.display(), "revert stage failed");
            }
        }
        None => {
            if let Err(err) = fs::remove_file(&write.absolute_path) {
                tracing::error!(path = %write.absolute_path.display(), %err, "revert unlink failed");
            }
        }
    }
}

fn sibling_temp(target: &Path) -> std::path::PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    target.with_file_name(format!(".{}.pw-staged", name))
}

fn status_label(status: &PreflightStatus) -> &'static str {
    match status {
        PreflightStatus::Passed => "passed",
        PreflightStatus::Failed { .. } => "failed",
        PreflightStatus::TimedOut => "timed_out",
        PreflightStatus::Skipped => "skipped",
    }
}
