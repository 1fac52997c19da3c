// server.rs — MCP adapter over the gateway core.
//
// PwGatewayServer implements the rmcp ServerHandler trait, exposing the
// nine Planward tools. The adapter is deliberately thin: it deserializes
// parameters, takes the state lock, calls the synchronous core, and maps
// results / error envelopes back into MCP shapes. The core never sees the
// transport, and concurrency at the adapter serializes into the core
// through the one mutex.
//
// Tools (prefixed `pw_` for namespacing):
//   pw_begin_session               — lock the workspace root, start the session
//   pw_read_prompt                 — fetch the role prompt (satisfies the gate)
//   pw_read_file                   — read a file or directory listing
//   pw_write_file                  — run a mutation through the admission gates
//   pw_list_plans                  — identities of approved plans
//   pw_read_audit_log              — raw audit log with entry count
//   pw_verify_workspace_integrity  — audit chain verification
//   pw_replay_execution            — read-only replay under one plan
//   pw_bootstrap_create_foundation_plan — single-use first-plan channel

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

use pw_plan::BootstrapPayload;
use pw_replay::ReplayFilters;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::pipeline::WriteRequest;
use crate::role_header::RoleMeta;
use crate::state::GatewayState;

// ── Tool parameter types ─────────────────────────────────────────

/// Parameters for `pw_begin_session`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BeginSessionParams {
    /// Absolute path of the workspace root to govern.
    pub workspace_root: String,
}

/// Parameters for `pw_read_prompt`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadPromptParams {
    /// Prompt name: "planner", "executor", or "governance" (role-gated).
    pub name: String,
}

/// Parameters for `pw_read_file`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// Path relative to the workspace root (or absolute inside it).
    pub path: String,
}

/// Parameters for `pw_write_file`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// Target path relative to the workspace root.
    pub path: String,
    /// Full file content. Mutually exclusive with `patch`.
    #[serde(default)]
    pub content: Option<String>,
    /// Unified diff against current content. Mutually exclusive with `content`.
    #[serde(default)]
    pub patch: Option<String>,
    /// Hash of the approved plan authorizing this write.
    pub plan: String,
    /// Plan phase this write executes under.
    #[serde(default)]
    pub phase: Option<String>,
    /// Concurrency precondition: expected SHA-256 of current disk content.
    #[serde(default)]
    pub previous_hash: Option<String>,
    /// Role header: artifact role (executable/library/infrastructure/documentation).
    #[serde(default)]
    pub role: Option<String>,
    /// Role header: owning team.
    #[serde(default)]
    pub owner: Option<String>,
    /// Role header: one-line purpose.
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Parameters for `pw_replay_execution`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReplayParams {
    /// Plan hash whose history to replay.
    pub plan: String,
    /// Restrict to one phase.
    #[serde(default)]
    pub phase: Option<String>,
    /// Restrict to one tool.
    #[serde(default)]
    pub tool: Option<String>,
    /// Restrict to sequence numbers >= this.
    #[serde(default)]
    pub seq_from: Option<u64>,
    /// Restrict to sequence numbers <= this.
    #[serde(default)]
    pub seq_to: Option<u64>,
}

/// Parameters for `pw_bootstrap_create_foundation_plan`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BootstrapParams {
    /// Intended plan path (must sit under docs/plans/). Optional: the
    /// canonical hash filename is computed either way.
    #[serde(default)]
    pub path: Option<String>,
    /// Full plan document, header included.
    pub plan_content: String,
    /// Signed payload fields.
    pub repo_id: String,
    /// RFC 3339 timestamp of the request.
    pub timestamp: String,
    pub nonce: String,
    pub action: String,
    /// Hex HMAC-SHA256 tag over the canonical payload JSON.
    pub signature: String,
}

// ── MCP Server ───────────────────────────────────────────────────

/// The Planward MCP gateway server.
pub struct PwGatewayServer {
    state: Arc<Mutex<GatewayState>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PwGatewayServer {
    /// Create a new gateway server from launch configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(GatewayState::new(config))),
            tool_router: Self::tool_router(),
        }
    }

    /// Wrap existing state (for testing).
    pub fn with_state(state: GatewayState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            tool_router: Self::tool_router(),
        }
    }

    /// Shared state handle (for testing).
    pub fn state(&self) -> &Arc<Mutex<GatewayState>> {
        &self.state
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, GatewayState>, McpError> {
        self.state
            .lock()
            .map_err(|e| McpError::internal_error(format!("lock poisoned: {}", e), None))
    }

    #[tool(
        description = "Initialize the governance session for a workspace root. Must be the first call; succeeds exactly once per process."
    )]
    fn pw_begin_session(
        &self,
        Parameters(params): Parameters<BeginSessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.lock()?;
        let info = state
            .begin_session(&params.workspace_root)
            .map_err(to_mcp_error)?;
        json_result(serde_json::json!({
            "status": info.status,
            "workspace_root": info.workspace_root,
            "session_id": info.session_id,
            "role": info.role,
        }))
    }

    #[tool(
        description = "Fetch the canonical prompt for this role. Reading the role prompt satisfies the prompt gate that writes require."
    )]
    fn pw_read_prompt(
        &self,
        Parameters(params): Parameters<ReadPromptParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.lock()?;
        let text = state.read_prompt(&params.name).map_err(to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "Read a file inside the workspace root. Directories (including the root itself) return a listing. Reads never require a plan."
    )]
    fn pw_read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let state = self.lock()?;
        let content = state.read_file(&params.path).map_err(to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(content)]))
    }

    #[tool(
        description = "Write a file under plan authority. The request traverses the full admission pipeline (path, concurrency, plan scope, content policy, atomic commit, preflight, audit) and either lands completely or not at all."
    )]
    fn pw_write_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let role_meta = params.role.as_ref().map(|role| RoleMeta {
            role: role.clone(),
            owner: params.owner.clone(),
            purpose: params.purpose.clone(),
        });
        let request = WriteRequest {
            path: params.path,
            content: params.content,
            patch: params.patch,
            plan: params.plan,
            phase: params.phase,
            previous_hash: params.previous_hash,
            role_meta,
        };

        let mut state = self.lock()?;
        let outcome = state.write_file(request).map_err(to_mcp_error)?;
        json_result(serde_json::json!({
            "status": "written",
            "path": outcome.path,
            "plan": outcome.plan_hash,
            "role": outcome.role,
            "content_hash": outcome.content_hash,
            "preflight": outcome.preflight.status,
            "audit_seq": outcome.audit_seq,
        }))
    }

    #[tool(description = "List the identities (hashes) of all approved plans.")]
    fn pw_list_plans(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.lock()?;
        let plans = state.list_plans().map_err(to_mcp_error)?;
        json_result(serde_json::json!({ "plans": plans, "count": plans.len() }))
    }

    #[tool(
        description = "Return the raw audit log (JSONL), preceded by a line indicating the entry count."
    )]
    fn pw_read_audit_log(&self) -> Result<CallToolResult, McpError> {
        let state = self.lock()?;
        let (count, raw) = state.read_audit_log().map_err(to_mcp_error)?;
        let body = format!("entries: {}\n{}", count, raw);
        Ok(CallToolResult::success(vec![Content::text(body)]))
    }

    #[tool(
        description = "Verify workspace integrity: audit log parses, sequences are gap-free, and the hash chain recomputes. Read-only."
    )]
    fn pw_verify_workspace_integrity(&self) -> Result<CallToolResult, McpError> {
        let state = self.lock()?;
        let report = state.verify_integrity().map_err(to_mcp_error)?;
        json_result(serde_json::to_value(&report).map_err(internal)?)
    }

    #[tool(
        description = "Replay one plan's audit history read-only, producing findings (tamper, divergence, authority, policy, evidence gaps). PASS iff no findings."
    )]
    fn pw_replay_execution(
        &self,
        Parameters(params): Parameters<ReplayParams>,
    ) -> Result<CallToolResult, McpError> {
        let filters = ReplayFilters {
            phase: params.phase,
            tool: params.tool,
            seq_range: match (params.seq_from, params.seq_to) {
                (None, None) => None,
                (lo, hi) => Some((lo.unwrap_or(1), hi.unwrap_or(u64::MAX))),
            },
        };
        let mut state = self.lock()?;
        let verdict = state
            .replay_execution(&params.plan, filters)
            .map_err(to_mcp_error)?;
        json_result(serde_json::to_value(&verdict).map_err(internal)?)
    }

    #[tool(
        description = "Create the first approved plan in an empty registry. Requires a fresh, HMAC-signed payload; succeeds at most once per workspace."
    )]
    fn pw_bootstrap_create_foundation_plan(
        &self,
        Parameters(params): Parameters<BootstrapParams>,
    ) -> Result<CallToolResult, McpError> {
        let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&params.timestamp)
            .map_err(|e| {
                McpError::invalid_params(format!("timestamp is not RFC 3339: {}", e), None)
            })?
            .with_timezone(&Utc);
        let payload = BootstrapPayload {
            repo_id: params.repo_id,
            timestamp,
            nonce: params.nonce,
            action: params.action,
        };

        let mut state = self.lock()?;
        let outcome = state
            .bootstrap(
                params.path.as_deref(),
                &params.plan_content,
                payload,
                &params.signature,
            )
            .map_err(to_mcp_error)?;
        json_result(serde_json::json!({
            "status": if outcome.noop { "noop" } else { "bootstrapped" },
            "plan_id": outcome.plan_hash,
            "plan_path": outcome.plan_path,
        }))
    }
}

// ── ServerHandler implementation ─────────────────────────────────

#[tool_handler]
impl ServerHandler for PwGatewayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "planward".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("Planward".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Planward governance gateway. Call pw_begin_session first, \
                 read your role prompt with pw_read_prompt, then perform \
                 writes with pw_write_file citing an approved plan hash. \
                 Every mutation is policy-checked, preflighted, and recorded \
                 in a hash-chained audit log."
                    .into(),
            ),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Convert a gateway error into an MCP error carrying the envelope.
fn to_mcp_error(err: GatewayError) -> McpError {
    let envelope = err.envelope();
    let data = serde_json::to_value(&envelope).ok();
    McpError::invalid_request(envelope.message, data)
}

fn internal(err: serde_json::Error) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![
        Content::json(value).map_err(|e| McpError::internal_error(e.to_string(), None))?
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_session::Role;

    fn test_server() -> PwGatewayServer {
        PwGatewayServer::new(GatewayConfig::new(Role::Executor))
    }

    #[test]
    fn tool_count_matches_the_surface() {
        let server = test_server();
        let tools = server.tool_router.list_all();
        let names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        assert_eq!(tools.len(), 9, "expected 9 tools, got: {:?}", names);
    }

    #[test]
    fn tool_names_are_prefixed() {
        let server = test_server();
        for tool in server.tool_router.list_all() {
            assert!(
                tool.name.starts_with("pw_"),
                "tool '{}' should be prefixed with 'pw_'",
                tool.name
            );
        }
    }

    #[test]
    fn envelope_travels_in_mcp_error_data() {
        let err = GatewayError::Schema("missing plan".into());
        let mcp = to_mcp_error(err);
        let data = mcp.data.expect("envelope data");
        assert_eq!(data["code"], "SCHEMA_INVALID");
        assert_eq!(data["phase"], "SESSION");
    }
}
