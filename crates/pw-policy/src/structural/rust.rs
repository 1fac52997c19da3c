// structural/rust.rs — Rust structural analysis backed by syn.
//
// Enforces the error-handling law for a language with sum-type results:
// a function whose name promises a meaningful failure mode must not use
// `Option` as its failure channel, and no function may erase its error
// into `Box<dyn Error>`. Also proves (rather than pattern-matches) the
// unconditional-authorization case: an auth-named function whose entire
// body is the literal `true` (or `Ok(true)`).

use crate::names;
use crate::violation::{ConstructCode, Violation};

/// Analyze Rust source. Parse failure is itself a violation.
pub fn analyze(content: &str) -> Vec<Violation> {
    let file = match syn::parse_file(content) {
        Ok(file) => file,
        Err(err) => {
            let line = err.span().start().line.max(1);
            return vec![Violation::new(
                ConstructCode::UnparseableSource,
                line,
                format!("Rust source does not parse: {}", err),
            )];
        }
    };

    let mut violations = Vec::new();
    walk_items(&file.items, &mut violations);
    violations
}

fn walk_items(items: &[syn::Item], violations: &mut Vec<Violation>) {
    for item in items {
        match item {
            syn::Item::Fn(item_fn) => {
                check_fn(&item_fn.sig, &item_fn.block, violations);
            }
            syn::Item::Impl(item_impl) => {
                for impl_item in &item_impl.items {
                    if let syn::ImplItem::Fn(method) = impl_item {
                        check_fn(&method.sig, &method.block, violations);
                    }
                }
            }
            syn::Item::Mod(item_mod) => {
                if let Some((_, nested)) = &item_mod.content {
                    walk_items(nested, violations);
                }
            }
            _ => {}
        }
    }
}

fn check_fn(sig: &syn::Signature, block: &syn::Block, violations: &mut Vec<Violation>) {
    let name = sig.ident.to_string();
    let line = sig.ident.span().start().line.max(1);

    if let syn::ReturnType::Type(_, ty) = &sig.output {
        if names::is_fallible_name(&name) && is_option(ty) {
            violations.push(Violation::new(
                ConstructCode::OptionAsErrorChannel,
                line,
                format!(
                    "fallible function '{}' returns Option; use a rich error type",
                    name
                ),
            ));
        }
        if is_boxed_error_result(ty) {
            violations.push(Violation::new(
                ConstructCode::ErasedBoxedError,
                line,
                format!(
                    "function '{}' erases its error into Box<dyn Error>",
                    name
                ),
            ));
        }
    }

    if names::is_auth_name(&name) && body_is_literal_true(block) {
        violations.push(Violation::new(
            ConstructCode::AuthDecisionAlwaysTrue,
            line,
            format!(
                "authorization function '{}' unconditionally evaluates to true",
                name
            ),
        ));
    }
}

/// Does the body consist solely of the literal `true`, `Ok(true)`, or
/// `return true;`? That is the unambiguous unconditional case.
fn body_is_literal_true(block: &syn::Block) -> bool {
    if block.stmts.len() != 1 {
        return false;
    }
    match &block.stmts[0] {
        syn::Stmt::Expr(expr, _) => expr_is_literal_true(expr),
        _ => false,
    }
}

fn expr_is_literal_true(expr: &syn::Expr) -> bool {
    match expr {
        syn::Expr::Lit(lit) => matches!(
            &lit.lit,
            syn::Lit::Bool(value) if value.value
        ),
        // Ok(true)
        syn::Expr::Call(call) => {
            if let syn::Expr::Path(path) = call.func.as_ref() {
                let is_ok = path
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == "Ok");
                is_ok
                    && call.args.len() == 1
                    && call.args.first().is_some_and(expr_is_literal_true)
            } else {
                false
            }
        }
        syn::Expr::Return(ret) => ret
            .expr
            .as_deref()
            .is_some_and(expr_is_literal_true),
        _ => false,
    }
}

fn is_option(ty: &syn::Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "Option")
}

/// Result<_, Box<dyn ...Error...>> in any path spelling.
fn is_boxed_error_result(ty: &syn::Type) -> bool {
    let Some(segment) = last_segment(ty) else {
        return false;
    };
    if segment.ident != "Result" {
        return false;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };
    let types: Vec<&syn::Type> = args
        .args
        .iter()
        .filter_map(|arg| match arg {
            syn::GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
        .collect();
    // Result<T> aliases carry their error elsewhere; nothing to inspect.
    let Some(error_ty) = types.get(1) else {
        return false;
    };
    is_boxed_dyn_error(error_ty)
}

fn is_boxed_dyn_error(ty: &syn::Type) -> bool {
    let Some(segment) = last_segment(ty) else {
        return false;
    };
    if segment.ident != "Box" {
        return false;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };
    args.args.iter().any(|arg| {
        let syn::GenericArgument::Type(syn::Type::TraitObject(obj)) = arg else {
            return false;
        };
        obj.bounds.iter().any(|bound| {
            let syn::TypeParamBound::Trait(trait_bound) = bound else {
                return false;
            };
            trait_bound
                .path
                .segments
                .last()
                .is_some_and(|seg| seg.ident == "Error")
        })
    })
}

fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    match ty {
        syn::Type::Path(path) => path.path.segments.last(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failure_is_a_violation() {
        let violations = analyze("fn broken( {");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ConstructCode::UnparseableSource);
    }

    #[test]
    fn fallible_name_returning_option_is_flagged() {
        let source = "pub fn parse_header(input: &str) -> Option<Header> { None }";
        let violations = analyze(source);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ConstructCode::OptionAsErrorChannel);
        assert_eq!(violations[0].line, 1);
    }

    #[test]
    fn lookup_returning_option_is_fine() {
        let source = "pub fn find_plan(hash: &str) -> Option<Plan> { None }";
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn boxed_error_result_is_flagged() {
        let source =
            "fn load_state(path: &Path) -> Result<State, Box<dyn std::error::Error>> { read(path) }";
        let violations = analyze(source);
        assert!(violations
            .iter()
            .any(|v| v.code == ConstructCode::ErasedBoxedError));
    }

    #[test]
    fn rich_error_result_is_fine() {
        let source = "fn load_state(path: &Path) -> Result<State, StateError> { read(path) }";
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn auth_fn_with_literal_true_body_is_flagged() {
        let source = "fn is_allowed(user: &User) -> bool { true }";
        let violations = analyze(source);
        assert_eq!(violations[0].code, ConstructCode::AuthDecisionAlwaysTrue);
    }

    #[test]
    fn auth_fn_returning_ok_true_is_flagged() {
        let source = "fn check_access(u: &User) -> Result<bool, AccessError> { Ok(true) }";
        let violations = analyze(source);
        assert!(violations
            .iter()
            .any(|v| v.code == ConstructCode::AuthDecisionAlwaysTrue));
    }

    #[test]
    fn auth_fn_with_real_logic_is_fine() {
        let source = r#"
fn is_allowed(user: &User) -> bool {
    user.roles.contains(&Role::Admin)
}
"#;
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn methods_inside_impls_are_checked() {
        let source = r#"
struct Gate;
impl Gate {
    fn is_allowed(&self) -> bool { true }
}
"#;
        let violations = analyze(source);
        assert_eq!(violations[0].code, ConstructCode::AuthDecisionAlwaysTrue);
        assert_eq!(violations[0].line, 4);
    }

    #[test]
    fn nested_modules_are_walked() {
        let source = r#"
mod inner {
    pub fn parse_config(s: &str) -> Option<Config> { None }
}
"#;
        let violations = analyze(source);
        assert_eq!(violations[0].code, ConstructCode::OptionAsErrorChannel);
    }
}
