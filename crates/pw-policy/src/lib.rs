//! # pw-policy
//!
//! Content policy for Planward: rejects writes that would introduce
//! known-harmful patterns or structurally ill-formed error handling.
//!
//! Two phases run in order. Phase A is a textual scan for hard blocks —
//! incomplete-work markers, test doubles outside test paths, unconditional
//! authorization passes, simulated-outcome flags, ambiguous empty returns.
//! Phase B parses the file (syn for Rust, tree-sitter for JS/TS/Python)
//! and inspects declarations: empty handlers, Option-as-error-channel,
//! erased boxed errors, proven always-true auth decisions. Plans may waive
//! phase B findings through ALLOW entries; phase A findings can never be
//! waived.

mod allowance;
mod engine;
mod language;
mod names;
mod structural;
mod textual;
mod violation;

pub use allowance::{Allowance, AllowanceSet};
pub use engine::ContentPolicy;
pub use language::Language;
pub use violation::{sort_violations, ConstructCode, Violation};
