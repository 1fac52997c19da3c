// allowance.rs — Per-plan authorized exceptions.
//
// A plan may enumerate exceptions by construct code + location + rationale
// (ALLOW lines in its header). The engine honors them only for structural
// findings: hard blocks (PW1xx) can never be waived, no matter what a plan
// declares. Path matching is glob-based and fail-closed, like every other
// pattern match in Planward.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::violation::{ConstructCode, Violation};

/// One authorized exception declared by a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allowance {
    /// Which construct the plan authorizes.
    pub code: ConstructCode,
    /// Path or glob the exception applies to.
    pub path: String,
    /// Specific line, or None for the whole file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Why the plan authorizes this construct.
    pub rationale: String,
}

/// The set of allowances granted by the cited plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceSet {
    entries: Vec<Allowance>,
}

impl AllowanceSet {
    pub fn new(entries: Vec<Allowance>) -> Self {
        Self { entries }
    }

    /// The empty set — nothing is waived.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Allowance] {
        &self.entries
    }

    /// Does any allowance waive this violation at this path?
    ///
    /// Hard blocks are never waived.
    pub fn waives(&self, path: &str, violation: &Violation) -> bool {
        if violation.code.is_hard_block() {
            return false;
        }
        self.entries.iter().any(|allowance| {
            allowance.code == violation.code
                && path_matches(&allowance.path, path)
                && allowance.line.map_or(true, |line| line == violation.line)
        })
    }
}

fn path_matches(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }
    match Pattern::new(pattern) {
        Ok(p) => p.matches(path),
        Err(_) => false, // Invalid patterns never match (fail-closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowance(code: ConstructCode, path: &str, line: Option<usize>) -> Allowance {
        Allowance {
            code,
            path: path.to_string(),
            line,
            rationale: "upstream API throws for flow control".to_string(),
        }
    }

    #[test]
    fn structural_violations_can_be_waived() {
        let set = AllowanceSet::new(vec![allowance(
            ConstructCode::EmptyHandlerBlock,
            "src/shim.js",
            Some(14),
        )]);
        let violation = Violation::new(ConstructCode::EmptyHandlerBlock, 14, "empty catch");
        assert!(set.waives("src/shim.js", &violation));
    }

    #[test]
    fn hard_blocks_are_never_waived() {
        let set = AllowanceSet::new(vec![allowance(
            ConstructCode::IncompleteWorkMarker,
            "src/main.rs",
            None,
        )]);
        let violation = Violation::new(ConstructCode::IncompleteWorkMarker, 3, "marker");
        assert!(!set.waives("src/main.rs", &violation));
    }

    #[test]
    fn line_mismatch_does_not_waive() {
        let set = AllowanceSet::new(vec![allowance(
            ConstructCode::EmptyHandlerBlock,
            "src/shim.js",
            Some(14),
        )]);
        let violation = Violation::new(ConstructCode::EmptyHandlerBlock, 99, "empty catch");
        assert!(!set.waives("src/shim.js", &violation));
    }

    #[test]
    fn whole_file_allowance_covers_any_line() {
        let set = AllowanceSet::new(vec![allowance(
            ConstructCode::ErasedBoxedError,
            "src/compat/*.rs",
            None,
        )]);
        let violation = Violation::new(ConstructCode::ErasedBoxedError, 42, "boxed");
        assert!(set.waives("src/compat/ffi.rs", &violation));
        assert!(!set.waives("src/core/ffi.rs", &violation));
    }

    #[test]
    fn empty_set_waives_nothing() {
        let violation = Violation::new(ConstructCode::EmptyHandlerBlock, 1, "empty");
        assert!(!AllowanceSet::empty().waives("a.js", &violation));
    }
}
