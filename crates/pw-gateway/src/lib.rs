//! # pw-gateway
//!
//! The admission pipeline and MCP tool surface for Planward.
//!
//! Every mutation an agent requests traverses the write gate in
//! [`pipeline`]: schema & session, path authority, concurrency
//! precondition, content materialization, plan authority, role-header
//! synthesis, content policy, atomic filesystem commit, preflight, and
//! finally the audit commit. Failures anywhere fail closed, with
//! deterministic revert once the tree has been touched. [`GatewayState`]
//! owns the session and wires the pieces together; [`PwGatewayServer`]
//! adapts it onto MCP.

mod config;
mod error;
mod materialized;
mod patch;
mod pipeline;
mod prompts;
mod role_header;
mod server;
mod state;

pub use config::{GatewayConfig, BOOTSTRAP_SECRET_ENV, PREFLIGHT_ENV, ROLE_ENV};
pub use error::{ErrorEnvelope, ErrorPhase, GatewayError};
pub use materialized::MaterializedWrite;
pub use patch::apply_patch;
pub use pipeline::{WriteOutcome, WriteRequest};
pub use role_header::RoleMeta;
pub use server::PwGatewayServer;
pub use state::{GatewayState, SessionInfo};
