//! # pw-session
//!
//! Process-scoped session state for Planward: the locked workspace root,
//! the launch-configured role (planner or executor), and the prompt gate
//! that writes must satisfy. Created exactly once by `begin_session` and
//! owned by the gateway — no globals.

mod error;
mod session;

pub use error::SessionError;
pub use session::{Role, Session};
