// session.rs — Process-scoped session state.
//
// A Session is created exactly once per process by the session
// initialization tool and lives until exit. It carries the locked
// workspace root, the launch-configured role, and the prompt-gate flag.
// There is deliberately no global: the gateway owns the one Session value
// and threads it through every operation.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Which side of the role separation this process runs as.
///
/// Fixed per process by launch configuration. Planner may author plans and
/// read; Executor may execute writes under plan authority and read. Neither
/// may delete or modify an approved plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Planner,
    Executor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Executor => "executor",
        }
    }

    /// The closed set of prompt names this role may fetch.
    pub fn allowed_prompts(&self) -> &'static [&'static str] {
        match self {
            Role::Planner => &["planner", "governance"],
            Role::Executor => &["executor", "governance"],
        }
    }

    /// Whether this role may execute filesystem writes.
    pub fn may_write(&self) -> bool {
        matches!(self, Role::Executor)
    }

    /// Whether this role may register new plans.
    pub fn may_register_plans(&self) -> bool {
        matches!(self, Role::Planner)
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planner" => Ok(Role::Planner),
            "executor" => Ok(Role::Executor),
            other => Err(SessionError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-scoped session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session.
    pub session_id: Uuid,

    /// The locked workspace root.
    pub workspace_root: PathBuf,

    /// Role fixed at launch.
    pub role: Role,

    /// Whether the role prompt has been fetched (the prompt gate).
    pub prompt_fetched: bool,

    /// When the session began (UTC).
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Begin a session for a locked workspace root.
    pub fn begin(workspace_root: impl Into<PathBuf>, role: Role) -> Self {
        let session = Self {
            session_id: Uuid::new_v4(),
            workspace_root: workspace_root.into(),
            role,
            prompt_fetched: false,
            started_at: Utc::now(),
        };
        tracing::info!(
            session_id = %session.session_id,
            role = %session.role,
            root = %session.workspace_root.display(),
            "session started"
        );
        session
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Resolve a prompt fetch: the name must be in the role's closed set.
    /// A successful fetch satisfies the prompt gate.
    pub fn fetch_prompt(&mut self, name: &str) -> Result<(), SessionError> {
        if !self.role.allowed_prompts().contains(&name) {
            return Err(SessionError::UnknownPrompt {
                name: name.to_string(),
                role: self.role.to_string(),
            });
        }
        self.prompt_fetched = true;
        Ok(())
    }

    /// Writes require both the executor role and a satisfied prompt gate.
    pub fn require_write_authority(&self) -> Result<(), SessionError> {
        if !self.role.may_write() {
            return Err(SessionError::RoleForbidden {
                role: self.role.to_string(),
                action: "execute writes".to_string(),
            });
        }
        if !self.prompt_fetched {
            return Err(SessionError::PromptGateLocked);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!(Role::from_str("Planner").unwrap(), Role::Planner);
        assert_eq!(Role::from_str("EXECUTOR").unwrap(), Role::Executor);
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn executor_writes_planner_does_not() {
        assert!(Role::Executor.may_write());
        assert!(!Role::Planner.may_write());
        assert!(Role::Planner.may_register_plans());
        assert!(!Role::Executor.may_register_plans());
    }

    #[test]
    fn session_ids_are_unique() {
        let a = Session::begin("/tmp/ws", Role::Executor);
        let b = Session::begin("/tmp/ws", Role::Executor);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn prompt_gate_starts_locked() {
        let session = Session::begin("/tmp/ws", Role::Executor);
        assert!(matches!(
            session.require_write_authority(),
            Err(SessionError::PromptGateLocked)
        ));
    }

    #[test]
    fn fetching_role_prompt_opens_the_gate() {
        let mut session = Session::begin("/tmp/ws", Role::Executor);
        session.fetch_prompt("executor").unwrap();
        assert!(session.require_write_authority().is_ok());
    }

    #[test]
    fn prompt_names_are_a_closed_set() {
        let mut session = Session::begin("/tmp/ws", Role::Executor);
        let err = session.fetch_prompt("planner").unwrap_err();
        assert!(matches!(err, SessionError::UnknownPrompt { .. }));
        // The failed fetch must not open the gate.
        assert!(!session.prompt_fetched);
    }

    #[test]
    fn planner_never_gains_write_authority() {
        let mut session = Session::begin("/tmp/ws", Role::Planner);
        session.fetch_prompt("planner").unwrap();
        assert!(matches!(
            session.require_write_authority(),
            Err(SessionError::RoleForbidden { .. })
        ));
    }

    #[test]
    fn governance_prompt_is_shared() {
        let mut planner = Session::begin("/tmp/ws", Role::Planner);
        let mut executor = Session::begin("/tmp/ws", Role::Executor);
        assert!(planner.fetch_prompt("governance").is_ok());
        assert!(executor.fetch_prompt("governance").is_ok());
    }
}
