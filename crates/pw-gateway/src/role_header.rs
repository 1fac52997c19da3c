// role_header.rs — Role-metadata synthesis and validation (G6).
//
// When a request supplies role-metadata fields, the pipeline synthesizes
// a comment header at the top of the materialized content, then parses it
// back and validates the result against a fixed role/artifact
// compatibility matrix — a file declaring an executable role cannot be an
// infrastructure-only artifact, and so on.

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Role-metadata fields supplied with a write request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleMeta {
    /// Declared artifact role: executable, library, infrastructure, documentation.
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// The closed set of declarable roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Executable,
    Library,
    Infrastructure,
    Documentation,
}

impl RoleKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "executable" => Some(RoleKind::Executable),
            "library" => Some(RoleKind::Library),
            "infrastructure" => Some(RoleKind::Infrastructure),
            "documentation" => Some(RoleKind::Documentation),
            _ => None,
        }
    }
}

/// What kind of artifact the target path is, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Source,
    Config,
    Documentation,
    Opaque,
}

impl ArtifactKind {
    fn from_path(path: &str) -> Self {
        match path.rsplit('.').next().unwrap_or("") {
            "rs" | "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "py" | "sh" => {
                ArtifactKind::Source
            }
            "toml" | "yaml" | "yml" | "ini" | "cfg" | "conf" => ArtifactKind::Config,
            "md" | "txt" | "rst" => ArtifactKind::Documentation,
            _ => ArtifactKind::Opaque,
        }
    }

    /// Comment prefix for header synthesis, or None when the format
    /// cannot carry a comment header at all (e.g. JSON).
    fn comment_prefix(path: &str) -> Option<&'static str> {
        match path.rsplit('.').next().unwrap_or("") {
            "rs" | "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => Some("//"),
            "py" | "sh" | "toml" | "yaml" | "yml" | "ini" | "cfg" | "conf" => Some("#"),
            _ => None,
        }
    }
}

/// The fixed compatibility matrix.
fn compatible(role: RoleKind, artifact: ArtifactKind) -> bool {
    matches!(
        (role, artifact),
        (RoleKind::Executable, ArtifactKind::Source)
            | (RoleKind::Library, ArtifactKind::Source)
            | (RoleKind::Infrastructure, ArtifactKind::Config)
            | (RoleKind::Infrastructure, ArtifactKind::Source)
            | (RoleKind::Documentation, ArtifactKind::Documentation)
    )
}

/// Synthesize the header block and validate role-vs-content consistency.
/// Returns the content with the header prepended.
pub fn synthesize(
    relative_path: &str,
    content: &str,
    meta: &RoleMeta,
) -> Result<String, GatewayError> {
    let role = RoleKind::parse(&meta.role).ok_or_else(|| {
        GatewayError::RoleHeaderInvalid(format!(
            "unknown role '{}': expected executable, library, infrastructure, or documentation",
            meta.role
        ))
    })?;

    let artifact = ArtifactKind::from_path(relative_path);
    if !compatible(role, artifact) {
        return Err(GatewayError::RoleHeaderInvalid(format!(
            "role '{}' is incompatible with artifact kind {:?} ({})",
            meta.role, artifact, relative_path
        )));
    }

    let Some(prefix) = ArtifactKind::comment_prefix(relative_path) else {
        return Err(GatewayError::RoleHeaderInvalid(format!(
            "'{}' cannot carry a role header (no comment syntax)",
            relative_path
        )));
    };

    let mut header = String::new();
    header.push_str(&format!("{} pw-role: {}\n", prefix, meta.role.to_lowercase()));
    if let Some(owner) = &meta.owner {
        header.push_str(&format!("{} pw-owner: {}\n", prefix, owner));
    }
    if let Some(purpose) = &meta.purpose {
        header.push_str(&format!("{} pw-purpose: {}\n", prefix, purpose));
    }
    header.push('\n');

    let synthesized = format!("{}{}", header, content);

    // Parse our own output back: the declared role must survive a
    // round-trip, which catches meta fields that break the comment syntax.
    match parse_declared_role(&synthesized, prefix) {
        Some(declared) if declared == meta.role.to_lowercase() => Ok(synthesized),
        _ => Err(GatewayError::RoleHeaderInvalid(
            "synthesized header failed to parse back".to_string(),
        )),
    }
}

fn parse_declared_role(content: &str, prefix: &str) -> Option<String> {
    let marker = format!("{} pw-role:", prefix);
    content
        .lines()
        .take(8)
        .find_map(|line| line.strip_prefix(marker.as_str()))
        .map(|value| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(role: &str) -> RoleMeta {
        RoleMeta {
            role: role.to_string(),
            owner: Some("platform".to_string()),
            purpose: Some("retry budget".to_string()),
        }
    }

    #[test]
    fn header_is_prepended_with_language_comments() {
        let out = synthesize("src/main.rs", "fn main() {}\n", &meta("executable")).unwrap();
        assert!(out.starts_with("// pw-role: executable\n"));
        assert!(out.contains("// pw-owner: platform\n"));
        assert!(out.ends_with("fn main() {}\n"));
    }

    #[test]
    fn python_uses_hash_comments() {
        let out = synthesize("tools/run.py", "print('hi')\n", &meta("executable")).unwrap();
        assert!(out.starts_with("# pw-role: executable\n"));
    }

    #[test]
    fn executable_role_on_config_is_rejected() {
        let err = synthesize("deploy/app.toml", "key = 1\n", &meta("executable")).unwrap_err();
        assert!(matches!(err, GatewayError::RoleHeaderInvalid(_)));
    }

    #[test]
    fn infrastructure_role_on_config_is_fine() {
        let out = synthesize("deploy/app.toml", "key = 1\n", &meta("infrastructure")).unwrap();
        assert!(out.starts_with("# pw-role: infrastructure\n"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = synthesize("src/main.rs", "fn main() {}\n", &meta("wizard")).unwrap_err();
        assert!(matches!(err, GatewayError::RoleHeaderInvalid(_)));
    }

    #[test]
    fn json_cannot_carry_a_header() {
        let err = synthesize("data/config.json", "{}\n", &meta("infrastructure")).unwrap_err();
        assert!(matches!(err, GatewayError::RoleHeaderInvalid(_)));
    }

    #[test]
    fn documentation_role_on_markdown_needs_comment_syntax() {
        // Markdown is a documentation artifact but has no line-comment
        // syntax, so a role header cannot be synthesized into it.
        let err = synthesize("docs/guide.md", "# Guide\n", &meta("documentation")).unwrap_err();
        assert!(matches!(err, GatewayError::RoleHeaderInvalid(_)));
    }

    #[test]
    fn minimal_meta_omits_optional_lines() {
        let out = synthesize(
            "src/lib.rs",
            "pub fn f() {}\n",
            &RoleMeta {
                role: "library".into(),
                owner: None,
                purpose: None,
            },
        )
        .unwrap();
        assert!(out.starts_with("// pw-role: library\n\npub fn f() {}\n"));
    }
}
