// structural/treesitter.rs — Empty-handler detection for JS/TS/Python.
//
// These languages signal errors through exceptions, so the structural law
// is about handlers: an empty catch/except block swallows failures, and an
// auth-named function whose whole body is `return true` is a proven
// unconditional pass. Both run on real tree-sitter syntax trees.
//
// Parsers are process-wide and lazily initialized; tree-sitter parsers
// need &mut for parsing, hence the Mutex.

use std::sync::{Mutex, OnceLock};

use tree_sitter::{Node, Parser};

use crate::language::Language;
use crate::names;
use crate::violation::{ConstructCode, Violation};

fn javascript_parser() -> &'static Mutex<Parser> {
    static PARSER: OnceLock<Mutex<Parser>> = OnceLock::new();
    PARSER.get_or_init(|| {
        let mut parser = Parser::new();
        let lang: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
        parser
            .set_language(&lang)
            .expect("JavaScript grammar loads");
        Mutex::new(parser)
    })
}

fn typescript_parser() -> &'static Mutex<Parser> {
    static PARSER: OnceLock<Mutex<Parser>> = OnceLock::new();
    PARSER.get_or_init(|| {
        let mut parser = Parser::new();
        let lang: tree_sitter::Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        parser
            .set_language(&lang)
            .expect("TypeScript grammar loads");
        Mutex::new(parser)
    })
}

fn python_parser() -> &'static Mutex<Parser> {
    static PARSER: OnceLock<Mutex<Parser>> = OnceLock::new();
    PARSER.get_or_init(|| {
        let mut parser = Parser::new();
        let lang: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        parser.set_language(&lang).expect("Python grammar loads");
        Mutex::new(parser)
    })
}

/// Analyze JS/TS/Python source. Parse failure is itself a violation.
pub fn analyze(language: Language, content: &str) -> Vec<Violation> {
    let parser = match language {
        Language::JavaScript => javascript_parser(),
        Language::TypeScript => typescript_parser(),
        Language::Python => python_parser(),
        _ => return Vec::new(),
    };

    let tree = {
        let mut parser = parser.lock().expect("parser lock poisoned");
        parser.parse(content, None)
    };

    let Some(tree) = tree else {
        return vec![Violation::new(
            ConstructCode::UnparseableSource,
            1,
            "source could not be parsed",
        )];
    };

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return vec![Violation::new(
            ConstructCode::UnparseableSource,
            line,
            "source contains syntax errors",
        )];
    }

    let mut violations = Vec::new();
    walk(root, content, language, &mut violations);
    violations
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    None
}

fn walk(node: Node, source: &str, language: Language, violations: &mut Vec<Violation>) {
    match (language, node.kind()) {
        (Language::JavaScript | Language::TypeScript, "catch_clause") => {
            if let Some(body) = node.child_by_field_name("body") {
                if block_is_empty(body) {
                    violations.push(Violation::new(
                        ConstructCode::EmptyHandlerBlock,
                        node.start_position().row + 1,
                        "empty catch block swallows the failure",
                    ));
                }
            }
        }
        (Language::Python, "except_clause") => {
            if let Some(body) = last_block_child(node) {
                if block_is_empty_or_pass(body) {
                    violations.push(Violation::new(
                        ConstructCode::EmptyHandlerBlock,
                        node.start_position().row + 1,
                        "empty except block swallows the failure",
                    ));
                }
            }
        }
        (
            Language::JavaScript | Language::TypeScript,
            "function_declaration" | "method_definition" | "function_expression",
        ) => {
            check_auth_function(node, source, violations);
        }
        (Language::Python, "function_definition") => {
            check_auth_function(node, source, violations);
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, language, violations);
    }
}

/// An auth-named function whose body is exactly `return true` is an
/// unconditional pass, proven on the syntax tree.
fn check_auth_function(node: Node, source: &str, violations: &mut Vec<Violation>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let Ok(name) = name_node.utf8_text(source.as_bytes()) else {
        return;
    };
    if !names::is_auth_name(name) {
        return;
    }
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };

    let statements = named_non_comment_children(body);
    let [only] = statements.as_slice() else {
        return;
    };
    if only.kind() != "return_statement" {
        return;
    }
    let returns_true = {
        let mut cursor = only.walk();
        let found = only.children(&mut cursor)
            .any(|child| matches!(child.kind(), "true" | "True"));
        found
    };
    if returns_true {
        violations.push(Violation::new(
            ConstructCode::AuthDecisionAlwaysTrue,
            node.start_position().row + 1,
            format!("authorization function '{}' unconditionally returns true", name),
        ));
    }
}

fn named_non_comment_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn block_is_empty(block: Node) -> bool {
    named_non_comment_children(block).is_empty()
}

fn block_is_empty_or_pass(block: Node) -> bool {
    named_non_comment_children(block)
        .iter()
        .all(|child| child.kind() == "pass_statement")
}

fn last_block_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let blocks: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "block")
        .collect();
    blocks.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catch_is_flagged() {
        let source = "try {\n  risky();\n} catch (err) {\n}\n";
        let violations = analyze(Language::JavaScript, source);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ConstructCode::EmptyHandlerBlock);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn catch_with_only_comments_is_still_empty() {
        let source = "try {\n  risky();\n} catch (err) {\n  // ignored\n}\n";
        let violations = analyze(Language::JavaScript, source);
        assert_eq!(violations[0].code, ConstructCode::EmptyHandlerBlock);
    }

    #[test]
    fn catch_that_handles_is_fine() {
        let source = "try {\n  risky();\n} catch (err) {\n  report(err);\n}\n";
        assert!(analyze(Language::JavaScript, source).is_empty());
    }

    #[test]
    fn typescript_uses_its_own_grammar() {
        let source = "function f(x: number): void {\n  try {\n    g(x);\n  } catch (e) {}\n}\n";
        let violations = analyze(Language::TypeScript, source);
        assert_eq!(violations[0].code, ConstructCode::EmptyHandlerBlock);
    }

    #[test]
    fn python_bare_pass_except_is_flagged() {
        let source = "try:\n    risky()\nexcept ValueError:\n    pass\n";
        let violations = analyze(Language::Python, source);
        assert_eq!(violations[0].code, ConstructCode::EmptyHandlerBlock);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn python_handled_except_is_fine() {
        let source = "try:\n    risky()\nexcept ValueError as e:\n    log(e)\n";
        assert!(analyze(Language::Python, source).is_empty());
    }

    #[test]
    fn auth_function_returning_true_is_flagged() {
        let source = "function isAllowed(user) {\n  return true;\n}\n";
        let violations = analyze(Language::JavaScript, source);
        assert_eq!(violations[0].code, ConstructCode::AuthDecisionAlwaysTrue);
    }

    #[test]
    fn python_auth_function_returning_true_is_flagged() {
        let source = "def check_access(user):\n    return True\n";
        let violations = analyze(Language::Python, source);
        assert_eq!(violations[0].code, ConstructCode::AuthDecisionAlwaysTrue);
    }

    #[test]
    fn auth_function_with_logic_is_fine() {
        let source = "function isAllowed(user) {\n  return user.admin === true;\n}\n";
        assert!(analyze(Language::JavaScript, source).is_empty());
    }

    #[test]
    fn syntax_errors_are_rejected() {
        let source = "function broken( {\n";
        let violations = analyze(Language::JavaScript, source);
        assert_eq!(violations[0].code, ConstructCode::UnparseableSource);
    }
}
