// registry.rs — Content-addressed plan store and governance state.
//
// Approved plans live at `docs/plans/<hash>.md`; the governance state at
// `.planward/governance.json` indexes them. The registry answers one
// question: is this plan hash a current authority, and what scope does it
// grant?
//
// State writes are staged to a temp file in the same directory and renamed
// into place — a torn write leaves the previous state intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pw_audit::hasher;
use pw_policy::ContentPolicy;

use crate::error::PlanError;
use crate::header::Plan;

/// Directory (relative to the workspace root) holding canonical plans.
pub const PLANS_DIR: &str = "docs/plans";
/// Governance marker directory.
pub const GOVERNANCE_DIR: &str = ".planward";
/// Governance state file inside the marker directory.
pub const STATE_FILE: &str = "governance.json";
/// Marker file proving the directory is governance-managed.
pub const ROOT_MARKER: &str = "ROOT";

/// One indexed plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanIndexEntry {
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub scope: Vec<String>,
    /// Workspace-relative path of the plan file.
    pub file_path: String,
    /// Whether the file hash has been re-verified since indexing.
    pub verified: bool,
}

/// Governance state, persisted as `.planward/governance.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernanceState {
    pub bootstrap_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_completed_at: Option<DateTime<Utc>>,
    pub approved_plans_count: u64,
    pub auto_register: bool,
    /// plan hash → entry. BTreeMap keeps serialization stable.
    pub plan_index: BTreeMap<String, PlanIndexEntry>,
}

impl Default for GovernanceState {
    fn default() -> Self {
        Self {
            bootstrap_enabled: true,
            bootstrap_completed_at: None,
            approved_plans_count: 0,
            auto_register: true,
            plan_index: BTreeMap::new(),
        }
    }
}

/// A successful lookup: the indexed entry plus the parsed plan.
#[derive(Debug, Clone)]
pub struct PlanLookup {
    pub entry: PlanIndexEntry,
    pub plan: Plan,
}

/// Findings from a registry-vs-disk reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Plans newly indexed from disk (auto_register).
    pub indexed: Vec<String>,
    /// Files whose name does not match their content hash.
    pub mismatched: Vec<String>,
    /// Indexed plans whose file has gone missing.
    pub missing: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

/// The plan registry: governance state plus the plans directory.
pub struct PlanRegistry {
    workspace_root: PathBuf,
    state: GovernanceState,
}

impl PlanRegistry {
    /// Load the registry for a workspace. A missing state file initializes
    /// defaults (bootstrap enabled, empty index) without writing anything.
    pub fn load(workspace_root: impl AsRef<Path>) -> Result<Self, PlanError> {
        let workspace_root = workspace_root.as_ref().to_path_buf();
        let state_path = workspace_root.join(GOVERNANCE_DIR).join(STATE_FILE);

        let state = if state_path.exists() {
            let json = fs::read_to_string(&state_path).map_err(|source| PlanError::Io {
                path: state_path.clone(),
                source,
            })?;
            // A partial/torn file is corruption, surfaced as a parse error.
            serde_json::from_str(&json)?
        } else {
            GovernanceState::default()
        };

        Ok(Self {
            workspace_root,
            state,
        })
    }

    pub fn state(&self) -> &GovernanceState {
        &self.state
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Absolute path of the plans directory.
    pub fn plans_dir(&self) -> PathBuf {
        self.workspace_root.join(PLANS_DIR)
    }

    /// Hashes of all indexed approved plans, sorted.
    pub fn approved_hashes(&self) -> Vec<String> {
        self.state.plan_index.keys().cloned().collect()
    }

    /// Look up a plan hash, returning the entry plus the parsed plan.
    ///
    /// Misses are structured: not indexed, file missing, hash mismatch, or
    /// status weakened. When `auto_register` is on, an unindexed file that
    /// checks out is indexed on this read.
    pub fn lookup(&mut self, hash: &str) -> Result<PlanLookup, PlanError> {
        let hash = hash.to_lowercase();

        if !self.state.plan_index.contains_key(&hash) {
            if self.state.auto_register {
                self.try_index_from_disk(&hash)?;
            } else {
                return Err(PlanError::NotIndexed(hash));
            }
        }

        let entry = self
            .state
            .plan_index
            .get(&hash)
            .cloned()
            .ok_or_else(|| PlanError::NotIndexed(hash.clone()))?;

        let file_path = self.workspace_root.join(&entry.file_path);
        if !file_path.exists() {
            return Err(PlanError::FileMissing {
                hash: hash.clone(),
                path: file_path,
            });
        }

        let content = fs::read_to_string(&file_path).map_err(|source| PlanError::Io {
            path: file_path.clone(),
            source,
        })?;
        let actual = hasher::hash_str(&content);
        if actual != hash {
            return Err(PlanError::HashMismatch {
                expected: hash.clone(),
                actual,
            });
        }

        let plan = Plan::parse(&content)?;
        if !plan.header.is_approved() {
            // Indexed as approved, but the file on disk no longer says so.
            return Err(PlanError::StatusWeakened(hash));
        }

        Ok(PlanLookup { entry, plan })
    }

    /// Register a planner-authored plan.
    ///
    /// Refuses when the registry is still empty — the first plan must
    /// arrive via bootstrap — and when the plan is not APPROVED or fails
    /// the linter.
    pub fn register(&mut self, content: &str, policy: &ContentPolicy) -> Result<Plan, PlanError> {
        if self.state.approved_plans_count == 0 {
            return Err(PlanError::RegistryEmpty);
        }
        self.admit(content, policy)
    }

    /// Register the foundation plan. Only the bootstrap module calls this.
    pub(crate) fn register_first(
        &mut self,
        content: &str,
        policy: &ContentPolicy,
    ) -> Result<Plan, PlanError> {
        let plan = self.admit(content, policy)?;
        self.state.bootstrap_enabled = false;
        self.state.bootstrap_completed_at = Some(Utc::now());
        self.persist()?;
        Ok(plan)
    }

    /// Shared admission: parse, verify APPROVED, lint, write file, index.
    fn admit(&mut self, content: &str, policy: &ContentPolicy) -> Result<Plan, PlanError> {
        let plan = Plan::parse(content)?;
        if !plan.header.is_approved() {
            return Err(PlanError::StatusNotApproved(plan.header.status.clone()));
        }
        plan.lint(policy)?;

        // Identical content is already registered: immutability makes this
        // a no-op rather than a conflict.
        if self.state.plan_index.contains_key(&plan.hash) {
            return Ok(plan);
        }

        let plans_dir = self.plans_dir();
        fs::create_dir_all(&plans_dir).map_err(|source| PlanError::Io {
            path: plans_dir.clone(),
            source,
        })?;
        let file_path = plans_dir.join(plan.file_name());
        fs::write(&file_path, content).map_err(|source| PlanError::Io {
            path: file_path.clone(),
            source,
        })?;

        self.state.plan_index.insert(
            plan.hash.clone(),
            PlanIndexEntry {
                status: plan.header.status.clone(),
                created_at: plan.header.created,
                scope: plan.header.scope.clone(),
                file_path: format!("{}/{}", PLANS_DIR, plan.file_name()),
                verified: true,
            },
        );
        self.state.approved_plans_count = self.state.plan_index.len() as u64;
        self.persist()?;

        tracing::info!(hash = %plan.hash, "plan registered");
        Ok(plan)
    }

    /// Scan the plans directory and reconcile against the index.
    ///
    /// Filename-vs-content-hash mismatches and missing indexed files are
    /// flagged; unindexed files that check out are added when
    /// `auto_register` is on.
    pub fn reconcile(&mut self) -> Result<ReconcileReport, PlanError> {
        let mut report = ReconcileReport::default();
        let plans_dir = self.plans_dir();

        if plans_dir.exists() {
            let entries = fs::read_dir(&plans_dir).map_err(|source| PlanError::Io {
                path: plans_dir.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| PlanError::Io {
                    path: plans_dir.clone(),
                    source,
                })?;
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };

                let content = fs::read_to_string(&path).map_err(|source| PlanError::Io {
                    path: path.clone(),
                    source,
                })?;
                let actual = hasher::hash_str(&content);
                if actual != stem {
                    report.mismatched.push(stem.to_string());
                    continue;
                }

                if !self.state.plan_index.contains_key(stem) && self.state.auto_register {
                    if let Ok(plan) = Plan::parse(&content) {
                        if plan.header.is_approved() {
                            self.state.plan_index.insert(
                                plan.hash.clone(),
                                PlanIndexEntry {
                                    status: plan.header.status.clone(),
                                    created_at: plan.header.created,
                                    scope: plan.header.scope.clone(),
                                    file_path: format!("{}/{}", PLANS_DIR, plan.file_name()),
                                    verified: true,
                                },
                            );
                            report.indexed.push(plan.hash);
                        }
                    }
                }
            }
        }

        for (hash, entry) in &self.state.plan_index {
            if !self.workspace_root.join(&entry.file_path).exists() {
                report.missing.push(hash.clone());
            }
        }

        if !report.indexed.is_empty() {
            self.state.approved_plans_count = self.state.plan_index.len() as u64;
            self.persist()?;
        }

        Ok(report)
    }

    /// Index a plan file straight from disk, if one exists for this hash.
    /// Used by `lookup` under `auto_register`; a missing file simply falls
    /// through to the NotIndexed miss.
    fn try_index_from_disk(&mut self, hash: &str) -> Result<(), PlanError> {
        let path = self.plans_dir().join(format!("{}.md", hash));
        if !path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&path).map_err(|source| PlanError::Io {
            path: path.clone(),
            source,
        })?;
        let actual = hasher::hash_str(&content);
        if actual != hash {
            return Err(PlanError::HashMismatch {
                expected: hash.to_string(),
                actual,
            });
        }
        let plan = Plan::parse(&content)?;
        if !plan.header.is_approved() {
            return Err(PlanError::StatusNotApproved(plan.header.status.clone()));
        }
        self.state.plan_index.insert(
            plan.hash.clone(),
            PlanIndexEntry {
                status: plan.header.status.clone(),
                created_at: plan.header.created,
                scope: plan.header.scope.clone(),
                file_path: format!("{}/{}", PLANS_DIR, plan.file_name()),
                verified: true,
            },
        );
        self.state.approved_plans_count = self.state.plan_index.len() as u64;
        self.persist()?;
        tracing::info!(hash, "plan auto-registered on read");
        Ok(())
    }

    /// Write governance state atomically: stage to a temp sibling, rename.
    pub(crate) fn persist(&self) -> Result<(), PlanError> {
        let dir = self.workspace_root.join(GOVERNANCE_DIR);
        fs::create_dir_all(&dir).map_err(|source| PlanError::Io {
            path: dir.clone(),
            source,
        })?;

        // The marker file travels with the state.
        let marker = dir.join(ROOT_MARKER);
        if !marker.exists() {
            fs::write(&marker, b"planward\n").map_err(|source| PlanError::Io {
                path: marker.clone(),
                source,
            })?;
        }

        let state_path = dir.join(STATE_FILE);
        let temp_path = dir.join(format!("{}.tmp", STATE_FILE));
        let json = serde_json::to_string_pretty(&self.state)?;
        fs::write(&temp_path, json).map_err(|source| PlanError::Io {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &state_path).map_err(|source| PlanError::Io {
            path: state_path.clone(),
            source,
        })?;
        Ok(())
    }
}
