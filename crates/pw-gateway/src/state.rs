// state.rs — The gateway core: session-owning state and the tool surface.
//
// GatewayState owns the one Session, the locked PathAuthority, the plan
// registry, the audit log, and the policy engine, and exposes the
// synchronous tool operations. The MCP layer in server.rs is a thin
// adapter over these methods; the core never touches the transport.
//
// Initialization order is enforced here: apart from begin_session itself
// (and pre-session audit buffering), every operation fails with
// SESSION_NOT_INITIALIZED until a session exists.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use pw_audit::{AuditEvent, AuditLog, PreSessionBuffer};
use pw_path::{PathAuthority, PathError};
use pw_plan::{
    bootstrap_foundation_plan, BootstrapOutcome, BootstrapPayload, BootstrapSecret, PlanRegistry,
    PLANS_DIR,
};
use pw_policy::ContentPolicy;
use pw_preflight::WorkspaceConfig;
use pw_replay::{replay, verify_workspace_integrity, IntegrityReport, ReplayFilters, ReplayVerdict, AUDIT_LOG_FILE};
use pw_session::{Session, SessionError};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::pipeline::{self, PipelineContext, WriteOutcome, WriteRequest};
use crate::prompts;

/// Returned by `begin_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub status: String,
    pub workspace_root: String,
    pub session_id: String,
    pub role: String,
}

/// The gateway core state.
pub struct GatewayState {
    config: GatewayConfig,
    session: Option<Session>,
    authority: Option<PathAuthority>,
    registry: Option<PlanRegistry>,
    audit: Option<AuditLog>,
    policy: ContentPolicy,
    workspace: WorkspaceConfig,
    buffer: PreSessionBuffer,
}

impl GatewayState {
    /// A gateway with no session yet. `begin_session` must come first.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            session: None,
            authority: None,
            registry: None,
            audit: None,
            policy: ContentPolicy::new(),
            workspace: WorkspaceConfig::default(),
            buffer: PreSessionBuffer::new(),
        }
    }

    // ── Session ──────────────────────────────────────────────────

    /// Initialize the session. Must be the first call; succeeds once.
    pub fn begin_session(&mut self, workspace_root: &str) -> Result<SessionInfo, GatewayError> {
        if let Some(session) = &self.session {
            return Err(GatewayError::Session(SessionError::AlreadyInitialized(
                session.workspace_root.display().to_string(),
            )));
        }

        let initialized = self.initialize(workspace_root);
        match initialized {
            Ok(info) => Ok(info),
            Err(err) => {
                // Failed initialization discards whatever was buffered.
                self.buffer.discard(workspace_root);
                Err(err)
            }
        }
    }

    fn initialize(&mut self, workspace_root: &str) -> Result<SessionInfo, GatewayError> {
        let authority = PathAuthority::lock(workspace_root).map_err(|err| match err {
            PathError::RootNotAbsolute(p) | PathError::RootNotDirectory(p) => {
                GatewayError::InvalidRoot(p)
            }
            other => GatewayError::Path(other),
        })?;
        let root = authority.root().to_path_buf();

        let audit = AuditLog::open(root.join(AUDIT_LOG_FILE))?;
        let registry = PlanRegistry::load(&root)?;
        let workspace = WorkspaceConfig::load(&root)?
            .with_command_override(self.config.preflight_override.as_deref());
        let policy = if workspace.policy.test_dirs.is_empty() {
            ContentPolicy::new()
        } else {
            ContentPolicy::with_test_dirs(&workspace.policy.test_dirs)
        };
        let session = Session::begin(&root, self.config.role);

        // Flush events that arrived before the session existed, in order,
        // then record the initialization itself.
        self.buffer.flush_into(workspace_root, &audit)?;
        audit.append(
            AuditEvent::new("begin_session", "init")
                .with_session(
                    session.session_id.to_string(),
                    session.role.to_string(),
                    root.display().to_string(),
                )
                .with_args(json!({"workspace_root": root.display().to_string()}))
                .with_result(json!({"status": "initialized"})),
        )?;

        let info = SessionInfo {
            status: "initialized".to_string(),
            workspace_root: root.display().to_string(),
            session_id: session.session_id.to_string(),
            role: session.role.to_string(),
        };

        self.session = Some(session);
        self.authority = Some(authority);
        self.registry = Some(registry);
        self.audit = Some(audit);
        self.workspace = workspace;
        self.policy = policy;
        Ok(info)
    }

    /// Buffer a pre-session event (used by the adapter for early arrivals).
    pub fn buffer_pre_session(&mut self, workspace_root: &str, event: AuditEvent) {
        self.buffer.push(workspace_root, event);
    }

    pub fn session(&self) -> Result<&Session, GatewayError> {
        self.session
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))
    }

    fn authority(&self) -> Result<&PathAuthority, GatewayError> {
        self.authority
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))
    }

    fn audit(&self) -> Result<&AuditLog, GatewayError> {
        self.audit
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))
    }

    // ── Prompts ──────────────────────────────────────────────────

    /// Fetch a canonical prompt; a successful fetch satisfies the gate.
    pub fn read_prompt(&mut self, name: &str) -> Result<String, GatewayError> {
        let session = self
            .session
            .as_mut()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        session.fetch_prompt(name)?;
        let text = prompts::text_for(name).ok_or_else(|| {
            GatewayError::Session(SessionError::UnknownPrompt {
                name: name.to_string(),
                role: session.role.to_string(),
            })
        })?;

        let session_id = session.session_id.to_string();
        let role = session.role.to_string();
        let root = session.workspace_root.display().to_string();
        self.audit()?.append(
            AuditEvent::new("read_prompt", "prompt")
                .with_session(session_id, role, root)
                .with_args(json!({"name": name}))
                .with_result(json!({"length": text.len()})),
        )?;
        Ok(text.to_string())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Read a file (or list a directory) inside the root. Reads do not
    /// require the prompt gate, and the plans/docs tree is always
    /// readable regardless of registry state.
    pub fn read_file(&self, path: &str) -> Result<String, GatewayError> {
        self.session()?;
        let resolved = self.authority()?.resolve_read(path)?;
        if resolved.is_dir() {
            let mut names: Vec<String> = fs::read_dir(&resolved)
                .map_err(|source| GatewayError::Io {
                    path: resolved.clone(),
                    source,
                })?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            return Ok(names.join("\n"));
        }
        let bytes = fs::read(&resolved).map_err(|source| GatewayError::Io {
            path: resolved.clone(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Run a mutation through the admission pipeline. Failed attempts are
    /// recorded in the audit log with their error code.
    pub fn write_file(&mut self, request: WriteRequest) -> Result<WriteOutcome, GatewayError> {
        let session = self
            .session
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        let authority = self
            .authority
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        let registry = self
            .registry
            .as_mut()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        let audit = self
            .audit
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;

        let mut ctx = PipelineContext {
            session,
            authority,
            registry,
            policy: &self.policy,
            preflight: self.workspace.preflight.as_ref(),
            audit,
        };

        match pipeline::admit(&mut ctx, &request) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // Decision: failed attempts leave an audit trace too.
                let mut event = AuditEvent::new("write_file", "write")
                    .with_session(
                        session.session_id.to_string(),
                        session.role.to_string(),
                        authority.root().display().to_string(),
                    )
                    .with_args(json!({
                        "path": request.path,
                        "plan": request.plan,
                        "phase": request.phase,
                    }))
                    .with_error(err.code(), err.invariant_id());
                if !request.plan.trim().is_empty() {
                    event = event.with_plan(request.plan.clone());
                }
                if let Some(phase) = &request.phase {
                    event = event.with_phase(phase.clone());
                }
                if let Err(log_err) = audit.append(event) {
                    tracing::error!(%log_err, "failed to record rejected write");
                }
                Err(err)
            }
        }
    }

    // ── Plans ────────────────────────────────────────────────────

    /// Identities of all approved plans.
    pub fn list_plans(&mut self) -> Result<Vec<String>, GatewayError> {
        self.session()?;
        let registry = self
            .registry
            .as_mut()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        registry.reconcile()?;
        Ok(registry.approved_hashes())
    }

    /// Bootstrap the first approved plan into an empty registry.
    pub fn bootstrap(
        &mut self,
        path: Option<&str>,
        plan_content: &str,
        payload: BootstrapPayload,
        signature: &str,
    ) -> Result<BootstrapOutcome, GatewayError> {
        let session = self
            .session
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;

        if let Some(path) = path {
            let normalized = path.trim_start_matches("./");
            if !normalized.starts_with(PLANS_DIR) {
                return Err(GatewayError::Schema(format!(
                    "foundation plan path must sit under {}/",
                    PLANS_DIR
                )));
            }
        }

        let root = session.workspace_root.clone();
        let registry = self
            .registry
            .as_mut()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        let secret = BootstrapSecret::load(&root, self.config.bootstrap_secret.as_deref())?;

        let session_id = session.session_id.to_string();
        let role = session.role.to_string();
        let result = bootstrap_foundation_plan(
            registry,
            &self.policy,
            plan_content,
            &payload,
            signature,
            &secret,
        );

        let audit = self
            .audit
            .as_ref()
            .ok_or(GatewayError::Session(SessionError::NotInitialized))?;
        match result {
            Ok(outcome) => {
                let intent = if outcome.noop { "bootstrap_noop" } else { "bootstrap" };
                audit.append(
                    AuditEvent::new("bootstrap", intent)
                        .with_session(session_id, role, root.display().to_string())
                        .with_plan(outcome.plan_hash.clone())
                        .with_args(json!({
                            "repo_id": payload.repo_id,
                            "nonce": payload.nonce,
                            "action": payload.action,
                            "timestamp": payload.timestamp.to_rfc3339(),
                            "signature": signature,
                        }))
                        .with_result(json!({
                            "plan_id": outcome.plan_hash,
                            "plan_path": outcome.plan_path,
                        })),
                )?;
                Ok(outcome)
            }
            Err(err) => {
                let gateway_err = GatewayError::Plan(err);
                if let Err(log_err) = audit.append(
                    AuditEvent::new("bootstrap", "bootstrap")
                        .with_session(session_id, role, root.display().to_string())
                        .with_args(json!({
                            "repo_id": payload.repo_id,
                            "nonce": payload.nonce,
                            "action": payload.action,
                            "signature": signature,
                        }))
                        .with_error(gateway_err.code(), gateway_err.invariant_id()),
                ) {
                    tracing::error!(%log_err, "failed to record rejected bootstrap");
                }
                Err(gateway_err)
            }
        }
    }

    // ── Audit access / replay ────────────────────────────────────

    /// The raw audit log bytes, with the entry count.
    pub fn read_audit_log(&self) -> Result<(u64, String), GatewayError> {
        self.session()?;
        let path = self.audit()?.path().to_path_buf();
        let raw = fs::read_to_string(&path).map_err(|source| GatewayError::Io {
            path,
            source,
        })?;
        let count = raw.lines().filter(|l| !l.trim().is_empty()).count() as u64;
        Ok((count, raw))
    }

    /// Read-only integrity verification of the current workspace.
    pub fn verify_integrity(&self) -> Result<IntegrityReport, GatewayError> {
        let session = self.session()?;
        Ok(verify_workspace_integrity(&session.workspace_root)?)
    }

    /// Read-only replay of one plan's history, plus one record noting
    /// that the replay ran.
    pub fn replay_execution(
        &mut self,
        plan_hash: &str,
        filters: ReplayFilters,
    ) -> Result<ReplayVerdict, GatewayError> {
        let session = self.session()?;
        let root = session.workspace_root.clone();
        let session_id = session.session_id.to_string();
        let role = session.role.to_string();

        let verdict = replay(&root, plan_hash, &filters)?;

        self.audit()?.append(
            AuditEvent::new("replay", "replay")
                .with_session(session_id, role, root.display().to_string())
                .with_plan(plan_hash.to_string())
                .with_args(json!({"plan": plan_hash}))
                .with_result(json!({
                    "pass": verdict.pass,
                    "findings": verdict.findings.len(),
                })),
        )?;
        Ok(verdict)
    }

    /// Workspace root, if a session exists (adapter convenience).
    pub fn workspace_root(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.workspace_root.as_path())
    }
}
