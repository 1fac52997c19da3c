//! # pw-preflight
//!
//! Preflight verification for Planward: runs the repository-configured
//! check command (tests, lints, build) against the working tree after a
//! write lands and before it is accepted as final. The command comes from
//! `.planward/config.toml` or a launch override — the runner never infers
//! or invents commands. Timeouts are enforced by killing the child, and
//! captured output travels with rejection payloads.

mod config;
mod error;
mod runner;

pub use config::{PolicyConfig, PreflightConfig, WorkspaceConfig, DEFAULT_TIMEOUT_SECS};
pub use error::PreflightError;
pub use runner::{run, PreflightReport, PreflightStatus};
