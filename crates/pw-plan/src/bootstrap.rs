// bootstrap.rs — Single-use creation of the first approved plan.
//
// Bootstrap is the only channel by which the registry transitions from
// empty to non-empty. The request must carry a keyed MAC over the
// canonical JSON of a timestamped payload; verification is constant-time
// (HMAC verify_slice) and stale payloads are rejected. On success the
// plan file is written, the registry updated, and bootstrap disabled
// atomically. There is no mechanism to re-enable it.
//
// Key handling follows the device-key pattern: 32 random bytes from the
// OS CSPRNG, stored hex-encoded with 0600 permissions, or supplied
// through the environment by the launcher.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use pw_audit::hasher;
use pw_policy::ContentPolicy;

use crate::error::PlanError;
use crate::registry::{PlanRegistry, GOVERNANCE_DIR};

type HmacSha256 = Hmac<Sha256>;

/// Filename of the file-based secret fallback inside `.planward/`.
pub const SECRET_FILE: &str = "bootstrap_secret.json";

/// Payloads older than this are rejected.
pub const FRESHNESS_WINDOW_SECS: i64 = 300;

const SECRET_LEN: usize = 32;

/// The signed bootstrap payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BootstrapPayload {
    pub repo_id: String,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
    pub action: String,
}

impl BootstrapPayload {
    /// Canonical JSON form — the exact bytes the MAC covers.
    pub fn canonical(&self) -> String {
        let value = serde_json::to_value(self).expect("payload serialization");
        hasher::canonical_json(&value)
    }
}

/// On-disk shape of the secret file.
#[derive(Serialize, Deserialize)]
struct SecretFile {
    secret: String,
}

/// The process-scoped bootstrap secret.
pub struct BootstrapSecret([u8; SECRET_LEN]);

impl BootstrapSecret {
    /// Load the secret: an environment-supplied hex value wins, otherwise
    /// the file fallback at `.planward/bootstrap_secret.json`.
    pub fn load(workspace_root: &Path, env_secret: Option<&str>) -> Result<Self, PlanError> {
        let secret_path = workspace_root.join(GOVERNANCE_DIR).join(SECRET_FILE);

        let hex = if let Some(env_value) = env_secret {
            env_value.trim().to_string()
        } else if secret_path.exists() {
            let json = fs::read_to_string(&secret_path).map_err(|source| PlanError::Io {
                path: secret_path.clone(),
                source,
            })?;
            let file: SecretFile = serde_json::from_str(&json)?;
            file.secret
        } else {
            return Err(PlanError::SecretMissing(secret_path));
        };

        let bytes =
            hex_decode(&hex).ok_or_else(|| PlanError::SecretMissing(secret_path.clone()))?;
        let secret: [u8; SECRET_LEN] = bytes
            .try_into()
            .map_err(|_| PlanError::SecretMissing(secret_path))?;
        Ok(Self(secret))
    }

    /// Generate a fresh secret file (no-op if one exists). Returns its path.
    pub fn generate(workspace_root: &Path) -> Result<PathBuf, PlanError> {
        let dir = workspace_root.join(GOVERNANCE_DIR);
        fs::create_dir_all(&dir).map_err(|source| PlanError::Io {
            path: dir.clone(),
            source,
        })?;
        let secret_path = dir.join(SECRET_FILE);
        if secret_path.exists() {
            return Ok(secret_path);
        }

        let mut key = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        let json = serde_json::to_string_pretty(&SecretFile {
            secret: hex_encode(&key),
        })?;
        fs::write(&secret_path, json).map_err(|source| PlanError::Io {
            path: secret_path.clone(),
            source,
        })?;

        // Owner read/write only on Unix; elsewhere the governance dir is
        // the boundary.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&secret_path, fs::Permissions::from_mode(0o600)).map_err(
                |source| PlanError::Io {
                    path: secret_path.clone(),
                    source,
                },
            )?;
        }

        Ok(secret_path)
    }

    /// Compute the hex tag for a payload. The CLI uses this to mint
    /// requests; tests use it to build valid ones.
    pub fn sign(&self, payload: &BootstrapPayload) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC accepts any key length");
        mac.update(payload.canonical().as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    /// Constant-time verification of a payload's tag.
    pub fn verify(&self, payload: &BootstrapPayload, tag_hex: &str) -> Result<(), PlanError> {
        let tag = hex_decode(tag_hex).ok_or(PlanError::BootstrapSignatureInvalid)?;
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("HMAC accepts any key length");
        mac.update(payload.canonical().as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| PlanError::BootstrapSignatureInvalid)
    }
}

/// What a bootstrap call produced.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub plan_hash: String,
    /// Workspace-relative plan path.
    pub plan_path: String,
    /// True when this was an idempotent repeat of a completed bootstrap.
    pub noop: bool,
}

/// Run the bootstrap gate sequence against a registry.
///
/// Any failure leaves the workspace unchanged. A repeat of a completed
/// bootstrap with identical content (and a valid, fresh signature)
/// collapses to a no-op success.
pub fn bootstrap_foundation_plan(
    registry: &mut PlanRegistry,
    policy: &ContentPolicy,
    content: &str,
    payload: &BootstrapPayload,
    signature_hex: &str,
    secret: &BootstrapSecret,
) -> Result<BootstrapOutcome, PlanError> {
    bootstrap_at(
        registry,
        policy,
        content,
        payload,
        signature_hex,
        secret,
        Utc::now(),
    )
}

/// Clock-injected variant for tests.
pub fn bootstrap_at(
    registry: &mut PlanRegistry,
    policy: &ContentPolicy,
    content: &str,
    payload: &BootstrapPayload,
    signature_hex: &str,
    secret: &BootstrapSecret,
    now: DateTime<Utc>,
) -> Result<BootstrapOutcome, PlanError> {
    let content_hash = hasher::hash_str(content);
    let open = registry.state().bootstrap_enabled && registry.state().approved_plans_count == 0;

    if !open {
        // Gate 1 would reject — unless this is the idempotent repeat case.
        if let Some(entry) = registry.state().plan_index.get(&content_hash) {
            secret.verify(payload, signature_hex)?;
            verify_freshness(payload, now)?;
            tracing::info!(hash = %content_hash, "duplicate bootstrap collapsed to no-op");
            return Ok(BootstrapOutcome {
                plan_hash: content_hash,
                plan_path: entry.file_path.clone(),
                noop: true,
            });
        }
        return Err(PlanError::BootstrapDisabled);
    }

    // Gate 2 — authenticated, fresh request.
    secret.verify(payload, signature_hex)?;
    verify_freshness(payload, now)?;

    // Gates 3 and 4 — parse, APPROVED, lint, then commit atomically.
    let plan = registry.register_first(content, policy)?;
    let plan_path = registry.state().plan_index[&plan.hash].file_path.clone();

    tracing::info!(hash = %plan.hash, "bootstrap completed; channel closed");
    Ok(BootstrapOutcome {
        plan_hash: plan.hash,
        plan_path,
        noop: false,
    })
}

fn verify_freshness(payload: &BootstrapPayload, now: DateTime<Utc>) -> Result<(), PlanError> {
    let age = now.signed_duration_since(payload.timestamp).num_seconds();
    if age > FRESHNESS_WINDOW_SECS {
        return Err(PlanError::BootstrapExpired(age));
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
