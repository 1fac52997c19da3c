// names.rs — Identifier classification shared by the textual and
// structural phases.
//
// Both phases need to agree on what counts as an "authorization-named"
// function and what counts as a "fallibly-named" one, so the lists live in
// one place. The lists are deliberately conservative: a miss here is a
// false negative the structural phase may still catch, while an overbroad
// token (say, bare "auth" matching "author") would reject honest code.

/// Does this function name encode an authorization decision?
pub(crate) fn is_auth_name(name: &str) -> bool {
    const TOKENS: &[&str] = &[
        "authoriz",
        "authoris",
        "permission",
        "permitted",
        "is_allowed",
        "allowed",
        "has_access",
        "can_access",
        "check_access",
        "access_control",
        "is_admin",
        "grant",
    ];
    let lower = name.to_lowercase();
    TOKENS.iter().any(|token| lower.contains(token))
}

/// Does this function name promise a meaningful failure mode?
///
/// Functions named like this must carry a rich error type — `Option` as
/// the failure channel erases the reason, and callers can't distinguish
/// "absent" from "broken".
pub(crate) fn is_fallible_name(name: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "try_", "load", "parse", "read", "write", "open", "fetch", "connect", "apply",
        "validate", "verify", "resolve",
    ];
    let lower = name.to_lowercase();
    PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}
