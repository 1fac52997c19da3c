// structural/mod.rs — Phase B: language-dispatched structural analysis.
//
// Where the textual phase pattern-matches lines, this phase parses the file
// into a real syntax tree and inspects declarations: return types, handler
// bodies, and trailing expressions. Dispatch is by file extension; a
// language with no analyzer gets textual-only treatment (the explicit
// unknown-language policy).
//
// Parse failure on a file the policy targets is itself a rejection —
// content the engine cannot analyze cannot be admitted.

mod rust;
mod treesitter;

use crate::language::Language;
use crate::violation::Violation;

/// Run the structural phase for the given language.
pub fn analyze(language: Language, content: &str) -> Vec<Violation> {
    match language {
        Language::Rust => rust::analyze(content),
        Language::JavaScript | Language::TypeScript | Language::Python => {
            treesitter::analyze(language, content)
        }
        // Unknown languages get no structural phase.
        Language::Unknown => Vec::new(),
    }
}
