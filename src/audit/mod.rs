use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::sync::Mutex;
use subtle::ConstantTimeEq;

use crate::error::{Result, VaultError};
use crate::types::*;

type HmacSha256 = Hmac<Sha256>;

/// What a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Add,
    Update,
    Rotate,
    Delete,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// A single audit log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    pub project: String,
    pub key: Option<String>,
    pub before_version: Option<u32>,
    pub after_version: Option<u32>,
    pub outcome: AuditOutcome,
    pub detail: Option<String>,
    pub chain_hmac: String,
}

impl AuditRecord {
    /// Build an unchained success record stamped now. The sink fills the
    /// chain hmac on append.
    pub fn new(actor: &str, action: AuditAction, project: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action,
            project: project.to_string(),
            key: None,
            before_version: None,
            after_version: None,
            outcome: AuditOutcome::Success,
            detail: None,
            chain_hmac: String::new(),
        }
    }

    pub fn failure(actor: &str, action: AuditAction, project: &str, detail: &str) -> Self {
        let mut record = Self::new(actor, action, project);
        record.outcome = AuditOutcome::Failure;
        record.detail = Some(detail.to_string());
        record
    }
}

/// Destination for audit records, shared by the store and the rotation
/// engine. Implementations must be safe to call from multiple tasks.
pub trait AuditSink: Send + Sync {
    /// Append one record. The record's `chain_hmac` field is assigned by
    /// the sink; any caller-provided value is ignored.
    ///
    /// Appends run synchronously on the caller's thread and may touch the
    /// filesystem, so an implementation must keep one append to a single
    /// small bounded write.
    fn append(&self, record: AuditRecord) -> Result<()>;
}

/// Sink used when auditing is disabled in config.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _record: AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Append without failing the caller: a sink error is logged, counted, and
/// swallowed. Mutations must not be blocked by a broken audit log.
pub fn append_best_effort(
    sink: &dyn AuditSink,
    failures: &std::sync::atomic::AtomicU64,
    record: AuditRecord,
) {
    if let Err(e) = sink.append(record) {
        failures.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        tracing::warn!(error = %e, "audit append failed");
    }
}

/// Append-only JSONL audit log with an HMAC chain over the records.
///
/// Each line's `chain_hmac` covers the previous line's hmac plus the
/// record fields, so truncation, reordering, and edits are all detectable
/// given the key.
pub struct FileAuditLog {
    path: PathBuf,
    hmac_key: Vec<u8>,
    // Serializes appends (two writers cannot fork the chain) and caches the
    // chain tail, so each append costs one write instead of rereading the
    // log for the previous hmac.
    last_hmac: Mutex<Option<String>>,
}

impl FileAuditLog {
    pub fn new(path: PathBuf, hmac_key: Vec<u8>) -> Self {
        Self {
            path,
            hmac_key,
            last_hmac: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn append(&self, mut record: AuditRecord) -> Result<()> {
        let mut last = self
            .last_hmac
            .lock()
            .map_err(|_| VaultError::Other("audit lock poisoned".to_string()))?;

        let prev_hmac = match last.as_ref() {
            Some(hmac) => hmac.clone(),
            None => read_last_hmac(&self.path),
        };
        record.chain_hmac = compute_chain_hmac(&chain_data(&prev_hmac, &record), &self.hmac_key);

        let json_line = serde_json::to_string(&record)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json_line)?;

        *last = Some(record.chain_hmac);
        Ok(())
    }
}

/// Read all audit records from the log file.
pub fn read_entries(audit_path: &Path) -> Result<Vec<AuditRecord>> {
    if !audit_path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(audit_path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord =
            serde_json::from_str(&line).map_err(|e| VaultError::Serialization(e.to_string()))?;
        entries.push(record);
    }

    Ok(entries)
}

/// Verify the HMAC chain integrity of the audit log. Returns the number of
/// records checked.
pub fn verify_chain(audit_path: &Path, hmac_key: &[u8]) -> Result<usize> {
    let entries = read_entries(audit_path)?;
    let mut prev_hmac = String::new();

    for (i, record) in entries.iter().enumerate() {
        let expected = compute_chain_hmac(&chain_data(&prev_hmac, record), hmac_key);
        let matches: bool = expected
            .as_bytes()
            .ct_eq(record.chain_hmac.as_bytes())
            .into();
        if !matches {
            return Err(VaultError::AuditChainBroken(i));
        }
        prev_hmac = record.chain_hmac.clone();
    }

    Ok(entries.len())
}

/// The byte string each chain hmac commits to. Field order is part of the
/// on-disk format.
fn chain_data(prev_hmac: &str, record: &AuditRecord) -> String {
    format!(
        "{}|{}|{}|{:?}|{}|{:?}|{:?}|{:?}|{:?}|{:?}",
        prev_hmac,
        record.timestamp.to_rfc3339(),
        record.actor,
        record.action,
        record.project,
        record.key,
        record.before_version,
        record.after_version,
        record.outcome,
        record.detail,
    )
}

fn read_last_hmac(audit_path: &Path) -> String {
    if !audit_path.exists() {
        return String::new();
    }

    // Read the file and get the last non-empty line
    if let Ok(content) = fs::read_to_string(audit_path) {
        for line in content.lines().rev() {
            if !line.trim().is_empty() {
                if let Ok(record) = serde_json::from_str::<AuditRecord>(line) {
                    return record.chain_hmac;
                }
            }
        }
    }

    String::new()
}

fn compute_chain_hmac(data: &str, hmac_key: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(hmac_key).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(action: AuditAction, key: &str) -> AuditRecord {
        let mut record = AuditRecord::new("tester", action, "web");
        record.key = Some(key.to_string());
        record.after_version = Some(1);
        record
    }

    #[test]
    fn chain_verifies_after_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = FileAuditLog::new(path.clone(), b"test-key".to_vec());

        log.append(sample(AuditAction::Add, "API_KEY")).unwrap();
        log.append(sample(AuditAction::Update, "API_KEY")).unwrap();
        log.append(sample(AuditAction::Delete, "DB_URL")).unwrap();

        assert_eq!(verify_chain(&path, b"test-key").unwrap(), 3);

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, AuditAction::Add);
        assert_ne!(entries[0].chain_hmac, entries[1].chain_hmac);
    }

    #[test]
    fn edit_breaks_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = FileAuditLog::new(path.clone(), b"test-key".to_vec());

        log.append(sample(AuditAction::Add, "API_KEY")).unwrap();
        log.append(sample(AuditAction::Rotate, "API_KEY")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let tampered = content.replacen("API_KEY", "EVIL_KEY", 1);
        std::fs::write(&path, tampered).unwrap();

        let err = verify_chain(&path, b"test-key").unwrap_err();
        assert!(matches!(err, VaultError::AuditChainBroken(0)));
    }

    #[test]
    fn reopened_log_continues_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let log = FileAuditLog::new(path.clone(), b"test-key".to_vec());
        log.append(sample(AuditAction::Add, "API_KEY")).unwrap();
        drop(log);

        // A fresh instance must pick the chain tail up from disk.
        let log = FileAuditLog::new(path.clone(), b"test-key".to_vec());
        log.append(sample(AuditAction::Update, "API_KEY")).unwrap();

        assert_eq!(verify_chain(&path, b"test-key").unwrap(), 2);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = FileAuditLog::new(path.clone(), b"test-key".to_vec());
        log.append(sample(AuditAction::Add, "API_KEY")).unwrap();

        assert!(verify_chain(&path, b"other-key").is_err());
    }

    #[test]
    fn missing_log_verifies_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        assert_eq!(verify_chain(&path, b"test-key").unwrap(), 0);
        assert!(read_entries(&path).unwrap().is_empty());
    }
}
