use crate::types::*;
use std::collections::BTreeSet;

use crate::error::{Result, VaultError};

/// Opaque encrypted payload produced by the encryption gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherValue {
    /// Base64 of the gateway output.
    pub ciphertext: String,
    /// Identifier of the key/recipient that can decrypt this value.
    pub key_id: String,
    /// Gateway payload format tag.
    pub format: u32,
}

/// Why a version was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisionReason {
    Manual,
    Import,
    Scheduled,
    PolicyForced,
}

impl RevisionReason {
    /// Reasons produced by the rotation engine rather than a direct caller.
    pub fn is_rotation(&self) -> bool {
        matches!(self, RevisionReason::Scheduled | RevisionReason::PolicyForced)
    }
}

/// One immutable version of a secret value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretVersion {
    pub number: u32,
    pub value: CipherValue,
    pub created_at: DateTime<Utc>,
    pub reason: RevisionReason,
}

/// Rotation policy attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RotationPolicy {
    /// Rotated only on explicit request.
    Manual,
    /// Rotated whenever `next_rotation_at` passes.
    Interval { every_secs: u64 },
    /// Rotated by external triggers only; the scheduler ignores it.
    EventTriggered,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy::Manual
    }
}

/// A single secret entry: the active version plus its full lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEntry {
    pub current: SecretVersion,
    /// Superseded versions, oldest first. Append-only.
    #[serde(default)]
    pub history: Vec<SecretVersion>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub rotation: RotationPolicy,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub next_rotation_at: Option<DateTime<Utc>>,
}

impl SecretEntry {
    /// Create a fresh entry at version 1.
    pub fn new(
        value: CipherValue,
        tags: BTreeSet<String>,
        rotation: RotationPolicy,
        reason: RevisionReason,
    ) -> Self {
        let now = Utc::now();
        let mut entry = Self {
            current: SecretVersion {
                number: 1,
                value,
                created_at: now,
                reason,
            },
            history: Vec::new(),
            tags,
            rotation,
            created_at: now,
            modified_at: now,
            next_rotation_at: None,
        };
        entry.derive_next_rotation(now);
        entry
    }

    /// Active version number.
    pub fn version(&self) -> u32 {
        self.current.number
    }

    /// Retire the active version into history and install a new one.
    pub fn supersede(&mut self, value: CipherValue, reason: RevisionReason) -> u32 {
        let now = Utc::now();
        let next_number = self.current.number + 1;
        let retired = std::mem::replace(
            &mut self.current,
            SecretVersion {
                number: next_number,
                value,
                created_at: now,
                reason,
            },
        );
        self.history.push(retired);
        self.modified_at = now;
        self.derive_next_rotation(now);
        next_number
    }

    /// Recompute `next_rotation_at` from the policy, anchored at `now`.
    pub fn derive_next_rotation(&mut self, now: DateTime<Utc>) {
        self.next_rotation_at = match self.rotation {
            RotationPolicy::Interval { every_secs } => {
                Some(now + chrono::Duration::seconds(every_secs as i64))
            }
            _ => None,
        };
    }

    /// Whether the scheduler should pick this entry up at `before`.
    pub fn is_due(&self, before: DateTime<Utc>) -> bool {
        matches!(self.rotation, RotationPolicy::Interval { .. })
            && self.next_rotation_at.is_some_and(|at| at <= before)
    }
}

/// Validate a secret key name.
///
/// Keys are map keys in the document and the left-hand side of dotenv
/// lines, so they must be non-empty and must not contain `=` or whitespace.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(VaultError::Validation("key must not be empty".to_string()));
    }
    if key.contains('=') {
        return Err(VaultError::Validation(format!(
            "key '{}' must not contain '='",
            key
        )));
    }
    if key.chars().any(|c| c.is_whitespace()) {
        return Err(VaultError::Validation(format!(
            "key '{}' must not contain whitespace",
            key
        )));
    }
    Ok(())
}

/// Validate a project name.
pub fn validate_project(project: &str) -> Result<()> {
    if project.trim().is_empty() {
        return Err(VaultError::Validation(
            "project must not be empty".to_string(),
        ));
    }
    Ok(())
}
