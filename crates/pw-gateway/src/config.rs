// config.rs — Gateway launch configuration.
//
// Everything the gateway reads from its environment, read once at startup
// and threaded through explicitly: the launch role, the optional
// bootstrap secret, and the optional preflight command override. No other
// global state is consulted.

use std::str::FromStr;

use pw_session::Role;

use crate::error::GatewayError;

/// Environment variable naming the launch role.
pub const ROLE_ENV: &str = "PLANWARD_ROLE";
/// Environment variable carrying the bootstrap secret (hex).
pub const BOOTSTRAP_SECRET_ENV: &str = "PLANWARD_BOOTSTRAP_SECRET";
/// Environment variable overriding the preflight command.
pub const PREFLIGHT_ENV: &str = "PLANWARD_PREFLIGHT";

/// Launch configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Role fixed for the life of the process.
    pub role: Role,
    /// Hex bootstrap secret supplied by the launcher, if any.
    pub bootstrap_secret: Option<String>,
    /// Whitespace-split preflight command override, if any.
    pub preflight_override: Option<String>,
}

impl GatewayConfig {
    /// Configuration with explicit values (used by tests and the CLI).
    pub fn new(role: Role) -> Self {
        Self {
            role,
            bootstrap_secret: None,
            preflight_override: None,
        }
    }

    /// Read launch configuration from the process environment.
    /// `role_flag` (from the CLI) wins over `PLANWARD_ROLE`.
    pub fn from_env(role_flag: Option<&str>) -> Result<Self, GatewayError> {
        let role_value = match role_flag {
            Some(value) => value.to_string(),
            None => std::env::var(ROLE_ENV).unwrap_or_else(|_| "executor".to_string()),
        };
        let role = Role::from_str(&role_value)?;
        Ok(Self {
            role,
            bootstrap_secret: std::env::var(BOOTSTRAP_SECRET_ENV).ok(),
            preflight_override: std::env::var(PREFLIGHT_ENV).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_role_flag_parses() {
        let config = GatewayConfig::from_env(Some("planner")).unwrap();
        assert_eq!(config.role, Role::Planner);
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(GatewayConfig::from_env(Some("root")).is_err());
    }
}
