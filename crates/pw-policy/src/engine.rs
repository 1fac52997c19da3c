// engine.rs — The content policy chokepoint.
//
// Two phases, applied in order, either failing short-circuits:
//
//   Phase A — textual forbidden patterns (hard blocks, plan-unwaivable)
//   Phase B — structural analysis on a parsed syntax tree (waivable
//             per-plan through ALLOW entries)
//
// Given the same content and the same allowances, the violation set is
// deterministic and order-stable: violations are sorted (line, code).

use glob::Pattern;

use crate::allowance::AllowanceSet;
use crate::language::Language;
use crate::structural;
use crate::textual;
use crate::violation::{sort_violations, Violation};

/// Default test-directory patterns, used when the repository config does
/// not declare its own.
const DEFAULT_TEST_DIR_PATTERNS: &[&str] = &[
    "tests/**",
    "test/**",
    "**/tests/**",
    "**/test/**",
    "**/*_test.*",
    "**/*.test.*",
    "**/test_*.py",
];

/// The content policy engine. One instance per gateway; stateless between
/// checks apart from the configured test-directory patterns.
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    test_dirs: Vec<Pattern>,
}

impl ContentPolicy {
    /// Engine with the default test-directory patterns.
    pub fn new() -> Self {
        Self::with_test_dirs(
            &DEFAULT_TEST_DIR_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
    }

    /// Engine with repository-declared test-directory patterns.
    /// Invalid patterns are dropped (fail-closed: fewer exemptions).
    pub fn with_test_dirs(patterns: &[String]) -> Self {
        let test_dirs = patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self { test_dirs }
    }

    /// Is this workspace-relative path inside a declared test directory?
    pub fn is_test_path(&self, path: &str) -> bool {
        self.test_dirs.iter().any(|p| p.matches(path))
    }

    /// Check materialized content destined for `path`.
    ///
    /// Returns the full ordered violation list on rejection. Allowances
    /// apply to structural findings only.
    pub fn check(
        &self,
        path: &str,
        content: &str,
        allowances: &AllowanceSet,
    ) -> Result<(), Vec<Violation>> {
        let language = Language::from_path(path);
        let is_test_path = self.is_test_path(path);

        // Phase A — hard blocks. Allowances are deliberately not consulted.
        let mut textual_violations = textual::scan(content, language, is_test_path);
        if !textual_violations.is_empty() {
            sort_violations(&mut textual_violations);
            tracing::debug!(
                path,
                count = textual_violations.len(),
                "content rejected by textual policy"
            );
            return Err(textual_violations);
        }

        // Phase B — structural, minus whatever the plan waives.
        let mut structural_violations: Vec<Violation> = structural::analyze(language, content)
            .into_iter()
            .filter(|violation| !allowances.waives(path, violation))
            .collect();
        if !structural_violations.is_empty() {
            sort_violations(&mut structural_violations);
            tracing::debug!(
                path,
                count = structural_violations.len(),
                "content rejected by structural policy"
            );
            return Err(structural_violations);
        }

        Ok(())
    }
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self::new()
    }
}
