// textual.rs — Phase A: textual forbidden-pattern scanning.
//
// Line-oriented, case-insensitive on keyword tokens, pattern set fixed at
// compile time. Matches inside comments still count — the scanner makes no
// attempt at reachability or semantic analysis; that is what the structural
// phase is for. Everything found here is a hard block: no plan allowance
// can waive a PW1xx finding.
//
// The only exemption: files under declared test directories skip the
// test-double identifier rule (PW102) and nothing else.

use std::sync::OnceLock;

use regex::Regex;

use crate::language::Language;
use crate::names;
use crate::violation::{ConstructCode, Violation};

fn incomplete_work() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(todo|fixme|xxx|hack)\b").unwrap())
}

fn test_double_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:fn|struct|enum|trait|type|class|def|function|let|const|var|interface)\s+([A-Za-z0-9_]*(?:mock|fake|dummy)[A-Za-z0-9_]*)\b",
        )
        .unwrap()
    })
}

fn test_double_assign() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*([A-Za-z0-9_]*(?:mock|fake|dummy)[A-Za-z0-9_]*)\s*=[^=]").unwrap()
    })
}

fn simulated_outcome() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(simulate[sd]?|simulation|dry_run|dry-run|dryrun)\b").unwrap()
    })
}

fn function_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:\bfn|\bdef|\bfunction)\s+([A-Za-z0-9_]+)|(?:\bconst|\blet|\bvar)\s+([A-Za-z0-9_]+)\s*=\s*(?:async\s*)?\(",
        )
        .unwrap()
    })
}

fn return_literal_true() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:\breturn\s+true\b|=>\s*true\b|\breturn\s+Ok\(true\))").unwrap())
}

fn ambiguous_empty_return() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\breturn\s+(?:null|undefined|''|"")\s*;?\s*$"#).unwrap()
    })
}

/// Run the phase A scan over file content.
///
/// `is_test_path` exempts the test-double rule only; every other pattern
/// applies everywhere.
pub fn scan(content: &str, language: Language, is_test_path: bool) -> Vec<Violation> {
    let mut violations = Vec::new();
    // Name of the most recently declared function, for the policy-pass rule.
    let mut current_fn: Option<String> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(found) = incomplete_work().captures(line) {
            violations.push(Violation::new(
                ConstructCode::IncompleteWorkMarker,
                line_no,
                format!("incomplete-work marker '{}'", &found[1]),
            ));
        }

        if !is_test_path {
            if let Some(found) = test_double_decl().captures(line) {
                violations.push(Violation::new(
                    ConstructCode::TestDoubleIdentifier,
                    line_no,
                    format!("test-double identifier '{}' outside a test path", &found[1]),
                ));
            } else if let Some(found) = test_double_assign().captures(line) {
                violations.push(Violation::new(
                    ConstructCode::TestDoubleIdentifier,
                    line_no,
                    format!("test-double identifier '{}' outside a test path", &found[1]),
                ));
            }
        }

        if let Some(found) = simulated_outcome().captures(line) {
            violations.push(Violation::new(
                ConstructCode::SimulatedOutcomeFlag,
                line_no,
                format!("simulated-outcome flag '{}'", &found[1]),
            ));
        }

        if let Some(decl) = function_decl().captures(line) {
            let name = decl.get(1).or_else(|| decl.get(2)).map(|m| m.as_str());
            current_fn = name.map(str::to_string);
        }

        if return_literal_true().is_match(line) {
            if let Some(name) = current_fn.as_deref() {
                if names::is_auth_name(name) {
                    violations.push(Violation::new(
                        ConstructCode::UnconditionalPolicyPass,
                        line_no,
                        format!("authorization function '{}' returns literal truth", name),
                    ));
                }
            }
        }

        if matches!(language, Language::JavaScript | Language::TypeScript)
            && ambiguous_empty_return().is_match(line)
        {
            violations.push(Violation::new(
                ConstructCode::AmbiguousEmptyReturn,
                line_no,
                "ambiguous empty return from a value-returning position".to_string(),
            ));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_rust(content: &str) -> Vec<Violation> {
        scan(content, Language::Rust, false)
    }

    #[test]
    fn finds_incomplete_work_markers() {
        let violations = scan_rust("let x = 1;\n// TODO: finish this\n");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ConstructCode::IncompleteWorkMarker);
        assert_eq!(violations[0].line, 2);
    }

    #[test]
    fn markers_are_case_insensitive() {
        let content = "// fIxMe later\n";
        let violations = scan_rust(content);
        assert_eq!(violations[0].code, ConstructCode::IncompleteWorkMarker);
    }

    #[test]
    fn markers_in_comments_still_count() {
        let content = "/* hack around the cache */\n";
        assert!(!scan_rust(content).is_empty());
    }

    #[test]
    fn finds_test_double_identifiers() {
        let violations = scan_rust("fn mock_server() {}\n");
        assert_eq!(violations[0].code, ConstructCode::TestDoubleIdentifier);
    }

    #[test]
    fn test_paths_are_exempt_from_test_doubles_only() {
        let content = "fn fake_client() {}\n";
        assert!(scan(content, Language::Rust, true).is_empty());

        // The exemption does not extend to other rules.
        let content = "fn fake_client() {}\n// TODO\n";
        let violations = scan(content, Language::Rust, true);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ConstructCode::IncompleteWorkMarker);
    }

    #[test]
    fn finds_python_double_assignment() {
        let violations = scan("mock_db = connect()\n", Language::Python, false);
        assert_eq!(violations[0].code, ConstructCode::TestDoubleIdentifier);
    }

    #[test]
    fn finds_simulated_outcome_flags() {
        let violations = scan_rust("let dry_run = true;\n");
        assert!(violations
            .iter()
            .any(|v| v.code == ConstructCode::SimulatedOutcomeFlag));
    }

    #[test]
    fn auth_function_returning_true_is_flagged() {
        let content = "fn is_allowed(user: &User) -> bool {\n    return true;\n}\n";
        let violations = scan_rust(content);
        assert!(violations
            .iter()
            .any(|v| v.code == ConstructCode::UnconditionalPolicyPass && v.line == 2));
    }

    #[test]
    fn ordinary_function_returning_true_is_fine() {
        let content = "fn has_trailing_newline(s: &str) -> bool {\n    return true;\n}\n";
        assert!(scan_rust(content).is_empty());
    }

    #[test]
    fn empty_returns_flagged_for_javascript_only() {
        let content = "function find(id) {\n  return null;\n}\n";
        let js = scan(content, Language::JavaScript, false);
        assert!(js
            .iter()
            .any(|v| v.code == ConstructCode::AmbiguousEmptyReturn));

        // The same text in a Rust file is not textually testable.
        assert!(scan(content, Language::Rust, false)
            .iter()
            .all(|v| v.code != ConstructCode::AmbiguousEmptyReturn));
    }

    #[test]
    fn clean_content_passes() {
        let content = "fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n";
        assert!(scan_rust(content).is_empty());
    }
}
