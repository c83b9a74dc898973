pub mod entry;
pub mod store;

use crate::types::*;
use crate::vault::entry::SecretEntry;

/// Current on-disk document format version.
pub const DOCUMENT_VERSION: u32 = 1;

/// The in-memory representation of the entire vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultDocument {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub projects: BTreeMap<String, Project>,
}

impl VaultDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: DOCUMENT_VERSION,
            created_at: now,
            modified_at: now,
            projects: BTreeMap::new(),
        }
    }

    /// Touch the modified timestamp.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Look up an entry, or the error the caller should surface.
    pub fn entry(&self, project: &str, key: &str) -> crate::error::Result<&SecretEntry> {
        self.projects
            .get(project)
            .ok_or_else(|| crate::error::VaultError::NotFound {
                project: project.to_string(),
                key: key.to_string(),
            })?
            .secrets
            .get(key)
            .ok_or_else(|| crate::error::VaultError::NotFound {
                project: project.to_string(),
                key: key.to_string(),
            })
    }

    /// Total number of secrets across all projects.
    pub fn secret_count(&self) -> usize {
        self.projects.values().map(|p| p.secrets.len()).sum()
    }
}

impl Default for VaultDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// A named grouping of secrets (typically one application or environment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub created_at: DateTime<Utc>,
    pub secrets: BTreeMap<String, SecretEntry>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Project {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            secrets: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the default envault directory path (~/.envault).
pub fn envault_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ENVAULT_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".envault")
}

/// Get the vault file path.
pub fn vault_path(dir: &Path) -> PathBuf {
    dir.join("vault.json")
}

/// Get the config file path.
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join("envault.toml")
}

/// Get the audit log path.
pub fn audit_path(dir: &Path) -> PathBuf {
    dir.join("audit.log")
}

/// Get the age identity file path.
pub fn identity_path(dir: &Path) -> PathBuf {
    dir.join("identity.age")
}

/// Check if the vault is initialized under the given directory.
pub fn is_initialized(dir: &Path) -> bool {
    vault_path(dir).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_lookup_reports_not_found() {
        let doc = VaultDocument::new();
        let err = doc.entry("web", "API_KEY").unwrap_err();
        assert!(matches!(
            err,
            crate::error::VaultError::NotFound { .. }
        ));
    }

    #[test]
    fn document_survives_unknown_fields() {
        let raw = r#"{
            "version": 1,
            "created_at": "2026-01-01T00:00:00Z",
            "modified_at": "2026-01-01T00:00:00Z",
            "projects": {},
            "some_future_field": true
        }"#;
        let doc: VaultDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.secret_count(), 0);
    }
}
