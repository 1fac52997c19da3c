// config.rs — Workspace configuration for preflight and policy.
//
// Loaded from `.planward/config.toml`. The runner never infers or invents
// commands: no `[preflight]` table means preflight is skipped, full stop.
//
//   [preflight]
//   command = ["cargo", "test", "--quiet"]
//   timeout_secs = 300
//
//   [preflight.env]
//   CI = "1"
//
//   [policy]
//   test_dirs = ["tests/**", "**/*_test.rs"]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PreflightError;

/// Default wall-clock budget for the verification command.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// The `[preflight]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreflightConfig {
    /// Command argv: name followed by arguments. Never inferred.
    pub command: Vec<String>,

    /// Wall-clock timeout, enforced by killing the child process.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment subset passed to the command (on top of inherited env).
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// The `[policy]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    /// Glob patterns naming test directories (test-double exemption).
    #[serde(default)]
    pub test_dirs: Vec<String>,
}

/// The whole `.planward/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub preflight: Option<PreflightConfig>,

    #[serde(default)]
    pub policy: PolicyConfig,
}

impl WorkspaceConfig {
    /// Load configuration for a workspace root. A missing file yields the
    /// default (no preflight command, no extra test dirs).
    pub fn load(workspace_root: &Path) -> Result<Self, PreflightError> {
        let path = workspace_root.join(".planward").join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path).map_err(|source| PreflightError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| PreflightError::ConfigInvalid {
            path,
            detail: source.to_string(),
        })
    }

    /// Apply a `PLANWARD_PREFLIGHT` override: whitespace-split argv.
    /// An empty override disables preflight entirely.
    pub fn with_command_override(mut self, override_value: Option<&str>) -> Self {
        if let Some(raw) = override_value {
            let command: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
            self.preflight = if command.is_empty() {
                None
            } else {
                Some(PreflightConfig {
                    command,
                    timeout_secs: self
                        .preflight
                        .as_ref()
                        .map_or(DEFAULT_TIMEOUT_SECS, |p| p.timeout_secs),
                    env: self.preflight.as_ref().map(|p| p.env.clone()).unwrap_or_default(),
                })
            };
        }
        self
    }
}
