// admission_flow.rs — End-to-end scenarios through the gateway core.
//
// Each test drives GatewayState the way the MCP adapter would: session
// first, prompt, bootstrap, then writes. Filesystem and audit assertions
// run against a real temp workspace.

use chrono::Utc;
use serde_json::json;
use tempfile::{tempdir, TempDir};

use pw_audit::{AuditEvent, AuditLog};
use pw_gateway::{GatewayConfig, GatewayError, GatewayState, WriteRequest};
use pw_plan::{BootstrapPayload, BootstrapSecret};
use pw_replay::ReplayFilters;
use pw_session::Role;

const SECRET_HEX_BYTE: &str = "1c";

const FOUNDATION_PLAN: &str = "\
---
STATUS: APPROVED
SCOPE: src/**
VERSION: 1
CREATED: 2026-07-01T09:00:00Z
PURPOSE: Govern source changes
---

Phase 1: implement.
";

fn secret_hex() -> String {
    SECRET_HEX_BYTE.repeat(32)
}

fn config(role: Role) -> GatewayConfig {
    GatewayConfig {
        role,
        bootstrap_secret: Some(secret_hex()),
        preflight_override: None,
    }
}

fn signed_payload(root: &std::path::Path) -> (BootstrapPayload, String) {
    let payload = BootstrapPayload {
        repo_id: "repo-1".to_string(),
        timestamp: Utc::now(),
        nonce: "nonce-1".to_string(),
        action: "bootstrap_create_foundation_plan".to_string(),
    };
    let secret = BootstrapSecret::load(root, Some(&secret_hex())).unwrap();
    let signature = secret.sign(&payload);
    (payload, signature)
}

/// Session begun, prompt gate satisfied, foundation plan bootstrapped.
fn governed_workspace(role: Role) -> (GatewayState, TempDir, String) {
    let dir = tempdir().unwrap();
    let mut state = GatewayState::new(config(role));
    state
        .begin_session(&dir.path().display().to_string())
        .unwrap();
    let prompt = match role {
        Role::Planner => "planner",
        Role::Executor => "executor",
    };
    state.read_prompt(prompt).unwrap();

    let (payload, signature) = signed_payload(dir.path());
    let outcome = state
        .bootstrap(None, FOUNDATION_PLAN, payload, &signature)
        .unwrap();
    let hash = outcome.plan_hash;
    (state, dir, hash)
}

fn write(path: &str, content: &str, plan: &str) -> WriteRequest {
    WriteRequest {
        path: path.to_string(),
        content: Some(content.to_string()),
        patch: None,
        plan: plan.to_string(),
        phase: Some("1".to_string()),
        previous_hash: None,
        role_meta: None,
    }
}

// ── Scenario 1: fresh workspace, bootstrap succeeds ──────────────

#[test]
fn fresh_workspace_bootstrap_succeeds() {
    let (state, dir, hash) = governed_workspace(Role::Executor);

    // One plan file at docs/plans/<hash>.md.
    let plan_file = dir.path().join("docs/plans").join(format!("{}.md", hash));
    assert!(plan_file.exists());

    // Governance state: bootstrap closed, one approved plan.
    let governance: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(".planward/governance.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(governance["bootstrap_enabled"], false);
    assert_eq!(governance["approved_plans_count"], 1);

    // Exactly one audit record with tool=bootstrap.
    let (_, raw) = state.read_audit_log().unwrap();
    let bootstrap_records = raw
        .lines()
        .filter(|l| l.contains("\"tool\":\"bootstrap\""))
        .count();
    assert_eq!(bootstrap_records, 1);
}

#[test]
fn duplicate_bootstrap_collapses_to_noop() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);

    let (payload, signature) = signed_payload(dir.path());
    let again = state
        .bootstrap(None, FOUNDATION_PLAN, payload, &signature)
        .unwrap();
    assert!(again.noop);
    assert_eq!(again.plan_hash, hash);

    // Still exactly one record with intent=bootstrap (the noop records
    // its own intent).
    let (_, raw) = state.read_audit_log().unwrap();
    assert_eq!(
        raw.lines()
            .filter(|l| l.contains("\"intent\":\"bootstrap\""))
            .count(),
        1
    );
    assert_eq!(
        raw.lines()
            .filter(|l| l.contains("\"intent\":\"bootstrap_noop\""))
            .count(),
        1
    );
}

#[test]
fn second_bootstrap_with_new_content_is_disabled() {
    let (mut state, dir, _hash) = governed_workspace(Role::Executor);

    let (payload, signature) = signed_payload(dir.path());
    let other_plan = FOUNDATION_PLAN.replace("Govern source changes", "Another purpose");
    let err = state
        .bootstrap(None, &other_plan, payload, &signature)
        .unwrap_err();
    assert_eq!(err.code(), "PLAN_BOOTSTRAP_DISABLED");
}

// ── Successful writes ────────────────────────────────────────────

#[test]
fn successful_write_lands_and_is_audited() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);
    let content = "pub fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n";

    let outcome = state
        .write_file(write("src/math.rs", content, &hash))
        .unwrap();

    // The file holds exactly the materialized content.
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/math.rs")).unwrap(),
        content
    );

    // The audit chain verifies and the last record matches the write.
    let report = state.verify_integrity().unwrap();
    assert!(report.pass);
    let records = AuditLog::read_all(dir.path().join("audit-log.jsonl")).unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.seq, outcome.audit_seq);
    assert_eq!(last.tool, "write_file");
    assert!(last.result_hash.is_some());
    assert!(last.error_code.is_none());
    assert_eq!(last.plan_hash.as_deref(), Some(hash.as_str()));
}

#[test]
fn patch_write_round_trip() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);
    state
        .write_file(write("src/lib.rs", "alpha\nbeta\ngamma\n", &hash))
        .unwrap();

    let patch = "@@ -1,3 +1,3 @@\n alpha\n-beta\n+BETA\n gamma\n";
    let request = WriteRequest {
        path: "src/lib.rs".to_string(),
        content: None,
        patch: Some(patch.to_string()),
        plan: hash.clone(),
        phase: Some("1".to_string()),
        previous_hash: None,
        role_meta: None,
    };
    state.write_file(request).unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
        "alpha\nBETA\ngamma\n"
    );
}

#[test]
fn failing_patch_leaves_file_untouched() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);
    let original = "alpha\nbeta\n";
    state
        .write_file(write("src/lib.rs", original, &hash))
        .unwrap();

    let request = WriteRequest {
        path: "src/lib.rs".to_string(),
        content: None,
        patch: Some("@@ -1,1 +1,1 @@\n-NOT PRESENT\n+x\n".to_string()),
        plan: hash,
        phase: Some("1".to_string()),
        previous_hash: None,
        role_meta: None,
    };
    let err = state.write_file(request).unwrap_err();
    assert_eq!(err.code(), "WRITE_PATCH_FAILED");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
        original
    );
}

#[test]
fn previous_hash_precondition_is_enforced() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);
    state
        .write_file(write("src/lib.rs", "original\n", &hash))
        .unwrap();

    // Stale hash: the caller believes different content is on disk.
    let request = WriteRequest {
        previous_hash: Some("0".repeat(64)),
        ..write("src/lib.rs", "clobber\n", &hash)
    };
    let err = state.write_file(request).unwrap_err();
    assert_eq!(err.code(), "WRITE_PREVIOUS_HASH_MISMATCH");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
        "original\n"
    );

    // Correct hash: the write proceeds.
    let current = pw_audit::hasher::hash_str("original\n");
    let request = WriteRequest {
        previous_hash: Some(current),
        ..write("src/lib.rs", "updated\n", &hash)
    };
    state.write_file(request).unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
        "updated\n"
    );
}

// ── Scenario 2: write rejected by forbidden pattern ──────────────

#[test]
fn forbidden_pattern_rejects_and_leaves_tree_unchanged() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);

    let content = "fn main() {\n    // TODO: wire this up\n}\n";
    let err = state
        .write_file(write("src/main.rs", content, &hash))
        .unwrap_err();

    let envelope = err.envelope();
    assert_eq!(envelope.code, "POLICY_HARD_BLOCK");
    let violations = envelope.violations.unwrap();
    assert_eq!(violations[0].line, 2);

    // Filesystem untouched.
    assert!(!dir.path().join("src/main.rs").exists());

    // The failed attempt is recorded with its error code; no success
    // record exists for the path.
    let records = AuditLog::read_all(dir.path().join("audit-log.jsonl")).unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.error_code.as_deref(), Some("POLICY_HARD_BLOCK"));
    assert!(last.result_hash.is_none());
}

#[test]
fn plan_scope_confines_writes() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);

    let err = state
        .write_file(write("docs/notes.md", "outside scope\n", &hash))
        .unwrap_err();
    assert_eq!(err.code(), "PLAN_OUT_OF_SCOPE");
    assert!(!dir.path().join("docs/notes.md").exists());
}

#[test]
fn unknown_plan_is_a_structured_miss() {
    let (mut state, _dir, _hash) = governed_workspace(Role::Executor);
    let err = state
        .write_file(write("src/a.rs", "fn a() {}\n", &"9".repeat(64)))
        .unwrap_err();
    assert_eq!(err.code(), "PLAN_NOT_FOUND");
}

// ── Scenario 3: preflight failure reverts ────────────────────────

#[test]
fn preflight_failure_reverts_to_pre_image() {
    let dir = tempdir().unwrap();
    // Pre-existing file, written outside governance.
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/keep.rs"), "fn keep() {}\n").unwrap();

    let mut state = GatewayState::new(GatewayConfig {
        role: Role::Executor,
        bootstrap_secret: Some(secret_hex()),
        preflight_override: Some("false".to_string()),
    });
    state
        .begin_session(&dir.path().display().to_string())
        .unwrap();
    state.read_prompt("executor").unwrap();
    let (payload, signature) = signed_payload(dir.path());
    let hash = state
        .bootstrap(None, FOUNDATION_PLAN, payload, &signature)
        .unwrap()
        .plan_hash;

    // Overwrite attempt: preflight fails, pre-image restored.
    let err = state
        .write_file(write("src/keep.rs", "fn changed() {}\n", &hash))
        .unwrap_err();
    assert!(matches!(err, GatewayError::PreflightRejected(_)));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/keep.rs")).unwrap(),
        "fn keep() {}\n"
    );

    // New-file attempt: the file is removed again.
    let err = state
        .write_file(write("src/fresh.rs", "fn fresh() {}\n", &hash))
        .unwrap_err();
    assert_eq!(err.code(), "PREFLIGHT_FAILED");
    assert!(!dir.path().join("src/fresh.rs").exists());
}

// ── Scenario 4: tamper detection ─────────────────────────────────

#[test]
fn corrupting_the_log_is_detected_with_seq() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);
    state
        .write_file(write("src/a.rs", "fn a() {}\n", &hash))
        .unwrap();

    let log_path = dir.path().join("audit-log.jsonl");
    let content = std::fs::read_to_string(&log_path).unwrap();
    // Corrupt one byte in the second record.
    let corrupted: Vec<String> = content
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 1 {
                line.replacen("\"role\":\"executor\"", "\"role\":\"executoX\"", 1)
            } else {
                line.to_string()
            }
        })
        .collect();
    std::fs::write(&log_path, corrupted.join("\n")).unwrap();

    let report = state.verify_integrity().unwrap();
    assert!(!report.pass);
    assert_eq!(
        report.first_failing_invariant.as_deref(),
        Some("HASH_CHAIN_INTACT")
    );
    assert_eq!(report.offending_seq, Some(2));
}

// ── Scenario 5: divergence detection ─────────────────────────────

#[test]
fn divergent_results_for_identical_args_are_found() {
    let (state, dir, hash) = governed_workspace(Role::Executor);
    drop(state); // release the log handle, as if the process exited

    // Two records with identical (tool, phase, args) but different
    // results, appended by a prior run.
    let log = AuditLog::open(dir.path().join("audit-log.jsonl")).unwrap();
    for result in ["one", "two"] {
        log.append(
            AuditEvent::new("write_file", "write")
                .with_session("s-old", "executor", dir.path().display().to_string())
                .with_plan(&hash)
                .with_phase("1")
                .with_args(json!({"path": "src/same.rs"}))
                .with_result(json!({"content_hash": result})),
        )
        .unwrap();
    }
    drop(log);

    let mut state = GatewayState::new(config(Role::Executor));
    state
        .begin_session(&dir.path().display().to_string())
        .unwrap();
    let verdict = state
        .replay_execution(&hash, ReplayFilters::default())
        .unwrap();
    assert!(!verdict.pass);
    let divergence = verdict
        .findings
        .iter()
        .find(|f| f.kind.as_str() == "DIVERGENCE_IDENTICAL_ARGS_DIFFERENT_RESULTS")
        .expect("divergence finding");
    assert_eq!(divergence.seqs.len(), 2);
}

// ── Scenario 6: traversal blocked ────────────────────────────────

#[test]
fn traversal_write_is_blocked_before_any_effect() {
    let (mut state, dir, hash) = governed_workspace(Role::Executor);

    let err = state
        .write_file(write("../etc/secret", "leak\n", &hash))
        .unwrap_err();
    let envelope = err.envelope();
    assert_eq!(envelope.code, "PATH_TRAVERSAL");

    // Nothing outside the root was created.
    assert!(!dir.path().parent().unwrap().join("etc/secret").exists());

    // No record claims success for the attempt.
    let records = AuditLog::read_all(dir.path().join("audit-log.jsonl")).unwrap();
    let attempt = records
        .iter()
        .filter(|r| r.tool == "write_file")
        .next_back()
        .unwrap();
    assert!(attempt.error_code.is_some());
    assert!(attempt.result_hash.is_none());
}

// ── Role separation & gates ──────────────────────────────────────

#[test]
fn planner_cannot_write() {
    let (mut state, _dir, hash) = governed_workspace(Role::Planner);
    let err = state
        .write_file(write("src/a.rs", "fn a() {}\n", &hash))
        .unwrap_err();
    assert_eq!(err.code(), "SESSION_ROLE_FORBIDDEN");
}

#[test]
fn writes_require_the_prompt_gate() {
    let dir = tempdir().unwrap();
    let mut state = GatewayState::new(config(Role::Executor));
    state
        .begin_session(&dir.path().display().to_string())
        .unwrap();
    let (payload, signature) = signed_payload(dir.path());
    let hash = state
        .bootstrap(None, FOUNDATION_PLAN, payload, &signature)
        .unwrap()
        .plan_hash;

    let err = state
        .write_file(write("src/a.rs", "fn a() {}\n", &hash))
        .unwrap_err();
    assert_eq!(err.code(), "SESSION_PROMPT_GATE_LOCKED");
}

#[test]
fn schema_violations_are_rejected_first() {
    let (mut state, _dir, hash) = governed_workspace(Role::Executor);

    // Both content and patch.
    let request = WriteRequest {
        patch: Some("@@ -0,0 +1,1 @@\n+x\n".to_string()),
        ..write("src/a.rs", "x\n", &hash)
    };
    assert_eq!(state.write_file(request).unwrap_err().code(), "SCHEMA_INVALID");

    // Neither content nor patch.
    let request = WriteRequest {
        content: None,
        ..write("src/a.rs", "", &hash)
    };
    assert_eq!(state.write_file(request).unwrap_err().code(), "SCHEMA_INVALID");
}

#[test]
fn list_plans_reports_the_registry() {
    let (mut state, _dir, hash) = governed_workspace(Role::Executor);
    let plans = state.list_plans().unwrap();
    assert_eq!(plans, vec![hash]);
}

#[test]
fn read_audit_log_reports_entry_count() {
    let (mut state, _dir, hash) = governed_workspace(Role::Executor);
    state
        .write_file(write("src/a.rs", "fn a() {}\n", &hash))
        .unwrap();

    let (count, raw) = state.read_audit_log().unwrap();
    // begin_session + read_prompt + bootstrap + write.
    assert_eq!(count, 4);
    assert_eq!(raw.lines().filter(|l| !l.trim().is_empty()).count() as u64, count);
}

#[test]
fn clean_replay_passes_end_to_end() {
    let (mut state, _dir, hash) = governed_workspace(Role::Executor);
    state
        .write_file(write("src/a.rs", "fn a() {}\n", &hash))
        .unwrap();

    let verdict = state
        .replay_execution(&hash, ReplayFilters::default())
        .unwrap();
    assert!(verdict.pass, "findings: {:?}", verdict.findings);
}
