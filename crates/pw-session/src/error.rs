// error.rs — Error types for session state.

use thiserror::Error;

/// Errors that can occur around session initialization and gating.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation ran before `begin_session`.
    #[error("session not initialized: call begin_session first")]
    NotInitialized,

    /// `begin_session` was called twice in one process.
    #[error("session already initialized for {0}")]
    AlreadyInitialized(String),

    /// The launch configuration named an unknown role.
    #[error("unknown role '{0}': expected 'planner' or 'executor'")]
    UnknownRole(String),

    /// A write was attempted before the role prompt was fetched.
    #[error("prompt gate locked: read_prompt must be called before writes")]
    PromptGateLocked,

    /// The requested prompt is not in the closed set for this role.
    #[error("prompt '{name}' is not available to role '{role}'")]
    UnknownPrompt { name: String, role: String },

    /// The active role may not perform the requested action.
    #[error("role '{role}' may not {action}")]
    RoleForbidden { role: String, action: String },
}
