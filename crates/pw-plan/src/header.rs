// header.rs — Plan document parsing and linting.
//
// A plan file is a delimited header block followed by free text:
//
//   ---
//   STATUS: APPROVED
//   SCOPE: src/**, docs/plans/**
//   VERSION: 1
//   CREATED: 2026-07-01T09:00:00Z
//   PURPOSE: Wire the retry budget through the fetch layer
//   PLAN-HASH: <hex>                            (optional)
//   ALLOW: PW202 src/shim.js:14 upstream throws for flow control
//   ---
//   <free text>
//
// Identity of a plan is the SHA-256 of its *entire* content, header
// included — editing any byte produces a different plan. The header may
// additionally declare its own hash; if present it must match.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};

use pw_audit::hasher;
use pw_policy::{Allowance, AllowanceSet, ConstructCode, ContentPolicy};

use crate::error::PlanError;

/// The literal status a plan must declare to be authoritative.
pub const STATUS_APPROVED: &str = "APPROVED";

const HEADER_DELIMITER: &str = "---";

fn field_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z][A-Z0-9-]*):\s*(.*)$").unwrap())
}

/// Parsed plan header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanHeader {
    pub status: String,
    /// Declared scope patterns, in declaration order.
    pub scope: Vec<String>,
    pub version: String,
    pub created: DateTime<Utc>,
    pub purpose: String,
    /// Optional self-declared content hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_hash: Option<String>,
    /// Authorized policy exceptions (ALLOW lines).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowances: Vec<Allowance>,
}

impl PlanHeader {
    pub fn is_approved(&self) -> bool {
        self.status == STATUS_APPROVED
    }

    /// Is the workspace-relative target path within the declared scope?
    ///
    /// Each scope entry is a glob; a bare directory entry (`src/` or a
    /// meta-character-free `src`) authorizes everything beneath it, so a
    /// declared-SCOPE string and an explicit path allowlist are the same
    /// mechanism.
    pub fn authorizes_path(&self, path: &str) -> bool {
        self.scope.iter().any(|entry| scope_entry_matches(entry, path))
    }

    /// The allowance set this plan grants to the policy engine.
    pub fn allowance_set(&self) -> AllowanceSet {
        AllowanceSet::new(self.allowances.clone())
    }
}

fn scope_entry_matches(entry: &str, path: &str) -> bool {
    if entry == path {
        return true;
    }
    let normalized = if let Some(dir) = entry.strip_suffix('/') {
        format!("{}/**", dir)
    } else if !entry.contains(['*', '?', '[']) {
        // A plain prefix entry authorizes the subtree.
        if path.starts_with(&format!("{}/", entry)) {
            return true;
        }
        entry.to_string()
    } else {
        entry.to_string()
    };
    match Pattern::new(&normalized) {
        Ok(pattern) => pattern.matches(path),
        Err(_) => false, // Invalid patterns never match (fail-closed)
    }
}

/// A fully parsed plan: content identity plus header.
#[derive(Debug, Clone)]
pub struct Plan {
    /// SHA-256 hex of the entire content.
    pub hash: String,
    pub header: PlanHeader,
    pub content: String,
}

impl Plan {
    /// Parse a plan document. Header structure only — linting is separate.
    pub fn parse(content: &str) -> Result<Self, PlanError> {
        let header = parse_header(content)?;
        let hash = hasher::hash_str(content);

        if let Some(declared) = &header.declared_hash {
            if declared != &hash {
                return Err(PlanError::DeclaredHashMismatch {
                    declared: declared.clone(),
                    actual: hash,
                });
            }
        }

        Ok(Self {
            hash,
            header,
            content: content.to_string(),
        })
    }

    /// Canonical on-disk filename for this plan.
    pub fn file_name(&self) -> String {
        format!("{}.md", self.hash)
    }

    /// Run the plan linter: required fields are already enforced by
    /// parsing; this applies the same content policy writes get. Plans
    /// carry no allowances for their own text.
    pub fn lint(&self, policy: &ContentPolicy) -> Result<(), PlanError> {
        policy
            .check(&self.file_name(), &self.content, &AllowanceSet::empty())
            .map_err(PlanError::LintFailed)
    }
}

fn parse_header(content: &str) -> Result<PlanHeader, PlanError> {
    let mut lines = content.lines();
    if lines.next().map(str::trim) != Some(HEADER_DELIMITER) {
        return Err(PlanError::HeaderInvalid(
            "plan must begin with a '---' header block".to_string(),
        ));
    }

    let mut status = None;
    let mut scope = None;
    let mut version = None;
    let mut created = None;
    let mut purpose = None;
    let mut declared_hash = None;
    let mut allowances = Vec::new();
    let mut terminated = false;

    for line in lines {
        let trimmed = line.trim();
        if trimmed == HEADER_DELIMITER {
            terminated = true;
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        let Some(captures) = field_line().captures(trimmed) else {
            return Err(PlanError::HeaderInvalid(format!(
                "unrecognized header line: '{}'",
                trimmed
            )));
        };
        let value = captures[2].trim().to_string();
        match &captures[1] {
            "STATUS" => status = Some(value),
            "SCOPE" => {
                scope = Some(
                    value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>(),
                )
            }
            "VERSION" => version = Some(value),
            "CREATED" => {
                let parsed = DateTime::parse_from_rfc3339(&value).map_err(|e| {
                    PlanError::HeaderInvalid(format!("CREATED is not RFC 3339: {}", e))
                })?;
                created = Some(parsed.with_timezone(&Utc));
            }
            "PURPOSE" => purpose = Some(value),
            "PLAN-HASH" => declared_hash = Some(value.to_lowercase()),
            "ALLOW" => allowances.push(parse_allow_line(&value)?),
            // Unknown fields are tolerated so plan formats can grow.
            _ => {}
        }
    }

    if !terminated {
        return Err(PlanError::HeaderInvalid(
            "header block is not terminated by '---'".to_string(),
        ));
    }

    let scope = scope.ok_or(PlanError::HeaderFieldMissing("SCOPE"))?;
    if scope.is_empty() {
        return Err(PlanError::HeaderFieldMissing("SCOPE"));
    }

    Ok(PlanHeader {
        status: status.ok_or(PlanError::HeaderFieldMissing("STATUS"))?,
        scope,
        version: version.ok_or(PlanError::HeaderFieldMissing("VERSION"))?,
        created: created.ok_or(PlanError::HeaderFieldMissing("CREATED"))?,
        purpose: purpose.ok_or(PlanError::HeaderFieldMissing("PURPOSE"))?,
        declared_hash,
        allowances,
    })
}

/// `ALLOW: <code> <path>[:<line>] <rationale...>`
fn parse_allow_line(value: &str) -> Result<Allowance, PlanError> {
    let mut parts = value.splitn(3, char::is_whitespace);
    let code_str = parts.next().unwrap_or_default();
    let location = parts.next().ok_or_else(|| {
        PlanError::HeaderInvalid(format!("ALLOW line missing location: '{}'", value))
    })?;
    let rationale = parts.next().unwrap_or("").trim().to_string();
    if rationale.is_empty() {
        return Err(PlanError::HeaderInvalid(format!(
            "ALLOW line missing rationale: '{}'",
            value
        )));
    }

    let code = ConstructCode::parse(code_str).ok_or_else(|| {
        PlanError::HeaderInvalid(format!("unknown construct code '{}'", code_str))
    })?;

    let (path, line) = match location.rsplit_once(':') {
        Some((path, line_str)) => match line_str.parse::<usize>() {
            Ok(line) => (path.to_string(), Some(line)),
            Err(_) => (location.to_string(), None),
        },
        None => (location.to_string(), None),
    };

    Ok(Allowance {
        code,
        path,
        line,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_text(status: &str, scope: &str) -> String {
        format!(
            "---\nSTATUS: {status}\nSCOPE: {scope}\nVERSION: 1\nCREATED: 2026-07-01T09:00:00Z\nPURPOSE: Improve the fetch layer\n---\n\nPhase 1: tighten retries.\n"
        )
    }

    #[test]
    fn parses_a_well_formed_plan() {
        let plan = Plan::parse(&plan_text("APPROVED", "src/**")).unwrap();
        assert!(plan.header.is_approved());
        assert_eq!(plan.header.scope, vec!["src/**"]);
        assert_eq!(plan.header.version, "1");
        assert_eq!(plan.hash.len(), 64);
    }

    #[test]
    fn hash_is_over_entire_content() {
        let a = Plan::parse(&plan_text("APPROVED", "src/**")).unwrap();
        let b = Plan::parse(&(plan_text("APPROVED", "src/**") + "extra line\n")).unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let content = "---\nSTATUS: APPROVED\nSCOPE: src/**\nVERSION: 1\n---\n";
        assert!(matches!(
            Plan::parse(content),
            Err(PlanError::HeaderFieldMissing(_))
        ));
    }

    #[test]
    fn unterminated_header_is_rejected() {
        let content = "---\nSTATUS: APPROVED\nSCOPE: src/**\n";
        assert!(matches!(
            Plan::parse(content),
            Err(PlanError::HeaderInvalid(_))
        ));
    }

    #[test]
    fn missing_leading_delimiter_is_rejected() {
        let content = "STATUS: APPROVED\n";
        assert!(matches!(
            Plan::parse(content),
            Err(PlanError::HeaderInvalid(_))
        ));
    }

    #[test]
    fn declared_hash_must_match() {
        let content = format!(
            "---\nSTATUS: APPROVED\nSCOPE: src/**\nVERSION: 1\nCREATED: 2026-07-01T09:00:00Z\nPURPOSE: x\nPLAN-HASH: {}\n---\n",
            "0".repeat(64)
        );
        assert!(matches!(
            Plan::parse(&content),
            Err(PlanError::DeclaredHashMismatch { .. })
        ));
    }

    #[test]
    fn scope_glob_matching() {
        let plan = Plan::parse(&plan_text("APPROVED", "src/**, docs/plans/**")).unwrap();
        assert!(plan.header.authorizes_path("src/main.rs"));
        assert!(plan.header.authorizes_path("src/deep/nested/mod.rs"));
        assert!(plan.header.authorizes_path("docs/plans/readme.md"));
        assert!(!plan.header.authorizes_path("Cargo.toml"));
    }

    #[test]
    fn bare_directory_scope_authorizes_subtree() {
        let plan = Plan::parse(&plan_text("APPROVED", "src/")).unwrap();
        assert!(plan.header.authorizes_path("src/main.rs"));
        assert!(plan.header.authorizes_path("src/a/b/c.rs"));
        assert!(!plan.header.authorizes_path("srcx/main.rs"));

        let plan = Plan::parse(&plan_text("APPROVED", "src")).unwrap();
        assert!(plan.header.authorizes_path("src/main.rs"));
        assert!(!plan.header.authorizes_path("other/main.rs"));
    }

    #[test]
    fn exact_file_scope() {
        let plan = Plan::parse(&plan_text("APPROVED", "Cargo.toml")).unwrap();
        assert!(plan.header.authorizes_path("Cargo.toml"));
        assert!(!plan.header.authorizes_path("Cargo.lock"));
    }

    #[test]
    fn allow_lines_parse() {
        let content = "---\nSTATUS: APPROVED\nSCOPE: src/**\nVERSION: 1\nCREATED: 2026-07-01T09:00:00Z\nPURPOSE: x\nALLOW: PW202 src/shim.js:14 upstream throws for flow control\nALLOW: PW204 src/compat/*.rs wrapping a C library\n---\n";
        let plan = Plan::parse(content).unwrap();
        assert_eq!(plan.header.allowances.len(), 2);
        assert_eq!(plan.header.allowances[0].code, ConstructCode::EmptyHandlerBlock);
        assert_eq!(plan.header.allowances[0].path, "src/shim.js");
        assert_eq!(plan.header.allowances[0].line, Some(14));
        assert_eq!(plan.header.allowances[1].line, None);
    }

    #[test]
    fn allow_line_requires_rationale() {
        let content = "---\nSTATUS: APPROVED\nSCOPE: src/**\nVERSION: 1\nCREATED: 2026-07-01T09:00:00Z\nPURPOSE: x\nALLOW: PW202 src/shim.js\n---\n";
        assert!(matches!(
            Plan::parse(content),
            Err(PlanError::HeaderInvalid(_))
        ));
    }

    #[test]
    fn lint_applies_the_content_policy() {
        let policy = ContentPolicy::new();
        let clean = Plan::parse(&plan_text("APPROVED", "src/**")).unwrap();
        assert!(clean.lint(&policy).is_ok());

        let dirty_text = plan_text("APPROVED", "src/**") + "\nTODO: decide later\n";
        let dirty = Plan::parse(&dirty_text).unwrap();
        assert!(matches!(dirty.lint(&policy), Err(PlanError::LintFailed(_))));
    }

    #[test]
    fn draft_status_parses_but_is_not_approved() {
        let plan = Plan::parse(&plan_text("DRAFT", "src/**")).unwrap();
        assert!(!plan.header.is_approved());
    }
}
