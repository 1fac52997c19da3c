// language.rs — Per-language dispatch for the policy engine.

use serde::{Deserialize, Serialize};

/// Languages the policy engine knows how to analyze structurally.
///
/// Everything else falls back to the textual-only scan — unknown files are
/// still scanned, they just get no structural phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Python,
    Unknown,
}

impl Language {
    /// Dispatch by file extension.
    pub fn from_path(path: &str) -> Self {
        let extension = path.rsplit('.').next().unwrap_or("");
        match extension {
            "rs" => Language::Rust,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "py" => Language::Python,
            _ => Language::Unknown,
        }
    }

    /// Whether the structural phase has an analyzer for this language.
    pub fn has_structural_analyzer(&self) -> bool {
        !matches!(self, Language::Unknown)
    }
}
