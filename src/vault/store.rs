//! Single-writer vault store.
//!
//! One background task owns the [`VaultDocument`]; every read and write is a
//! command sent over an mpsc channel and answered on a oneshot. The task is
//! the serialization point: concurrent callers can never interleave inside a
//! mutation, so cross-key writes all land and same-key writes apply in
//! channel order.
//!
//! Plaintext never enters the task. Handles encrypt through the gateway
//! before sending a mutation and decrypt after receiving ciphertext back,
//! so a slow gateway stalls only its caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::audit::{AuditAction, AuditRecord, AuditSink};
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::gateway::EncryptionGateway;
use crate::retry::{retry, RetryConfig};
use crate::types::*;
use crate::vault::entry::{
    validate_key, validate_project, CipherValue, RevisionReason, RotationPolicy, SecretEntry,
};
use crate::vault::{vault_path, Project, VaultDocument, DOCUMENT_VERSION};

const COMMAND_BUFFER: usize = 64;

/// A request to create or overwrite one secret value.
#[derive(Debug)]
pub struct PutRequest {
    pub project: String,
    pub key: String,
    pub value: SecretString,
    /// Replace the entry's tags; `None` keeps what is there.
    pub tags: Option<std::collections::BTreeSet<String>>,
    /// Replace the entry's rotation policy; `None` keeps what is there.
    pub rotation: Option<RotationPolicy>,
    pub reason: RevisionReason,
    pub actor: String,
    /// Compare-and-set guard. `Some(n)` requires the live version to be
    /// exactly `n` (`0` means the key must not exist yet); a mismatch fails
    /// with `Conflict` and changes nothing.
    pub expected_version: Option<u32>,
}

impl PutRequest {
    pub fn new(project: &str, key: &str, value: SecretString) -> Self {
        Self {
            project: project.to_string(),
            key: key.to_string(),
            value,
            tags: None,
            rotation: None,
            reason: RevisionReason::Manual,
            actor: "local".to_string(),
            expected_version: None,
        }
    }
}

/// What a `put` did.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PutOutcome {
    /// Version now active.
    pub version: u32,
    /// Version that was superseded, `None` when the key was created.
    pub previous: Option<u32>,
}

/// Filters for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub tag: Option<String>,
    pub key_prefix: Option<String>,
}

/// One secret's metadata, without any cipher material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSummary {
    pub key: String,
    pub version: u32,
    pub tags: Vec<String>,
    pub rotation: RotationPolicy,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub next_rotation_at: Option<DateTime<Utc>>,
}

/// An entry whose interval policy has come due.
#[derive(Debug, Clone, Serialize)]
pub struct RotationTarget {
    pub project: String,
    pub key: String,
    pub next_rotation_at: DateTime<Utc>,
}

/// The mutation half of a [`PutRequest`]. The plaintext stays on the
/// handle side; only ciphertext crosses the channel.
struct PutOp {
    project: String,
    key: String,
    tags: Option<std::collections::BTreeSet<String>>,
    rotation: Option<RotationPolicy>,
    reason: RevisionReason,
    actor: String,
    expected_version: Option<u32>,
}

enum Command {
    Get {
        project: String,
        key: String,
        reply: oneshot::Sender<Result<SecretEntry>>,
    },
    Put {
        op: PutOp,
        value: CipherValue,
        reply: oneshot::Sender<Result<PutOutcome>>,
    },
    Delete {
        project: String,
        key: String,
        actor: String,
        reply: oneshot::Sender<Result<u32>>,
    },
    List {
        project: String,
        filter: ListFilter,
        reply: oneshot::Sender<Result<Vec<SecretSummary>>>,
    },
    Snapshot {
        reply: oneshot::Sender<VaultDocument>,
    },
    Restore {
        document: VaultDocument,
        actor: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ListDue {
        before: DateTime<Utc>,
        reply: oneshot::Sender<Vec<RotationTarget>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap-clone handle to the store task.
#[derive(Clone)]
pub struct VaultStore {
    tx: mpsc::Sender<Command>,
    gateway: Arc<dyn EncryptionGateway>,
    sink: Arc<dyn AuditSink>,
    retry: RetryConfig,
    gateway_timeout: Duration,
    audit_failures: Arc<AtomicU64>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl VaultStore {
    /// Create a fresh vault under `dir` and start the writer task.
    pub async fn create(
        dir: &Path,
        gateway: Arc<dyn EncryptionGateway>,
        sink: Arc<dyn AuditSink>,
        config: &Config,
    ) -> Result<Self> {
        let path = vault_path(dir);
        if path.exists() {
            return Err(VaultError::VaultAlreadyExists(path.display().to_string()));
        }
        tokio::fs::create_dir_all(dir).await?;

        let document = VaultDocument::new();
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        let io_timeout = Duration::from_secs(config.store.io_timeout_secs);
        write_atomic(&path, &bytes, io_timeout).await?;
        tracing::info!(path = %path.display(), "created vault");

        Ok(Self::spawn(document, path, gateway, sink, config))
    }

    /// Open an existing vault under `dir` and start the writer task.
    pub async fn open(
        dir: &Path,
        gateway: Arc<dyn EncryptionGateway>,
        sink: Arc<dyn AuditSink>,
        config: &Config,
    ) -> Result<Self> {
        let path = vault_path(dir);
        if !path.exists() {
            return Err(VaultError::VaultNotInitialized);
        }
        let bytes = tokio::fs::read(&path).await?;
        let document: VaultDocument = serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        if document.version > DOCUMENT_VERSION {
            return Err(VaultError::Validation(format!(
                "vault document version {} is newer than supported version {}",
                document.version, DOCUMENT_VERSION
            )));
        }
        tracing::info!(
            path = %path.display(),
            secrets = document.secret_count(),
            "opened vault"
        );

        Ok(Self::spawn(document, path, gateway, sink, config))
    }

    fn spawn(
        document: VaultDocument,
        path: PathBuf,
        gateway: Arc<dyn EncryptionGateway>,
        sink: Arc<dyn AuditSink>,
        config: &Config,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let retry = RetryConfig {
            max_attempts: config.store.retry_attempts,
            initial_backoff: Duration::from_millis(config.store.retry_backoff_ms),
            ..RetryConfig::default()
        };
        let audit_failures = Arc::new(AtomicU64::new(0));

        let task = StoreTask {
            document,
            path,
            sink: Arc::clone(&sink),
            retry: retry.clone(),
            io_timeout: Duration::from_secs(config.store.io_timeout_secs),
            audit_failures: Arc::clone(&audit_failures),
            rx,
        };
        let handle = tokio::spawn(task.run());

        Self {
            tx,
            gateway,
            sink,
            retry,
            gateway_timeout: Duration::from_secs(config.gateway.timeout_secs),
            audit_failures,
            task: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Fetch one entry (ciphertext and metadata, no plaintext).
    pub async fn get(&self, project: &str, key: &str) -> Result<SecretEntry> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Get {
            project: project.to_string(),
            key: key.to_string(),
            reply,
        })
        .await?;
        recv(rx).await?
    }

    /// Create or overwrite one secret. Encrypts before anything is mutated,
    /// so a gateway failure leaves the vault untouched.
    pub async fn put(&self, request: PutRequest) -> Result<PutOutcome> {
        validate_project(&request.project)?;
        validate_key(&request.key)?;

        let PutRequest {
            project,
            key,
            value,
            tags,
            rotation,
            reason,
            actor,
            expected_version,
        } = request;

        let value = match self.encrypt(&value).await {
            Ok(value) => value,
            Err(e) => {
                // The handle cannot see the document, so a failed create of
                // a fresh key is still recorded as an update.
                let action = match reason {
                    RevisionReason::Scheduled | RevisionReason::PolicyForced => AuditAction::Rotate,
                    RevisionReason::Import => AuditAction::Import,
                    RevisionReason::Manual => AuditAction::Update,
                };
                let mut record = AuditRecord::failure(&actor, action, &project, &e.to_string());
                record.key = Some(key.clone());
                self.audit_best_effort(record);
                return Err(e);
            }
        };

        let op = PutOp {
            project,
            key,
            tags,
            rotation,
            reason,
            actor,
            expected_version,
        };
        let (reply, rx) = oneshot::channel();
        self.send(Command::Put { op, value, reply }).await?;
        recv(rx).await?
    }

    /// Remove one secret. Returns the removed version.
    pub async fn delete(&self, project: &str, key: &str, actor: &str) -> Result<u32> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Delete {
            project: project.to_string(),
            key: key.to_string(),
            actor: actor.to_string(),
            reply,
        })
        .await?;
        recv(rx).await?
    }

    /// List secret metadata for one project, key-ascending.
    pub async fn list(&self, project: &str, filter: ListFilter) -> Result<Vec<SecretSummary>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::List {
            project: project.to_string(),
            filter,
            reply,
        })
        .await?;
        recv(rx).await?
    }

    /// Consistent point-in-time clone of the whole document.
    pub async fn snapshot(&self) -> Result<VaultDocument> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        recv(rx).await
    }

    /// Replace the whole document (backup restore).
    pub async fn restore(&self, document: VaultDocument, actor: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Restore {
            document,
            actor: actor.to_string(),
            reply,
        })
        .await?;
        recv(rx).await?
    }

    /// Interval-policy entries due at or before `before`.
    pub async fn list_due(&self, before: DateTime<Utc>) -> Result<Vec<RotationTarget>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ListDue { before, reply }).await?;
        recv(rx).await
    }

    /// Decrypt the active version of one secret.
    pub async fn decrypt_current(&self, project: &str, key: &str) -> Result<SecretString> {
        let entry = self.get(project, key).await?;
        self.decrypt(&entry.current.value).await
    }

    /// Decrypt a specific version (current or historical) of one secret.
    pub async fn decrypt_version(
        &self,
        project: &str,
        key: &str,
        number: u32,
    ) -> Result<SecretString> {
        let entry = self.get(project, key).await?;
        let value = if entry.current.number == number {
            &entry.current.value
        } else {
            &entry
                .history
                .iter()
                .find(|v| v.number == number)
                .ok_or_else(|| VaultError::NotFound {
                    project: project.to_string(),
                    key: format!("{} (version {})", key, number),
                })?
                .value
        };
        self.decrypt(value).await
    }

    /// Number of audit appends that failed and were swallowed.
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    /// Stop the writer task. Queued commands finish first.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
        let handle = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn encrypt(&self, value: &SecretString) -> Result<CipherValue> {
        retry(&self.retry, "gateway encrypt", || async {
            match timeout(self.gateway_timeout, self.gateway.encrypt(value)).await {
                Ok(result) => result,
                Err(_) => Err(VaultError::GatewayUnavailable(
                    "encrypt timed out".to_string(),
                )),
            }
        })
        .await
    }

    async fn decrypt(&self, value: &CipherValue) -> Result<SecretString> {
        retry(&self.retry, "gateway decrypt", || async {
            match timeout(self.gateway_timeout, self.gateway.decrypt(value)).await {
                Ok(result) => result,
                Err(_) => Err(VaultError::GatewayUnavailable(
                    "decrypt timed out".to_string(),
                )),
            }
        })
        .await
    }

    fn audit_best_effort(&self, record: AuditRecord) {
        crate::audit::append_best_effort(self.sink.as_ref(), &self.audit_failures, record);
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| VaultError::StoreUnavailable("store task stopped".to_string()))
    }
}

async fn recv<T>(rx: oneshot::Receiver<T>) -> Result<T> {
    rx.await
        .map_err(|_| VaultError::StoreUnavailable("store task dropped the reply".to_string()))
}

struct StoreTask {
    document: VaultDocument,
    path: PathBuf,
    sink: Arc<dyn AuditSink>,
    retry: RetryConfig,
    io_timeout: Duration,
    audit_failures: Arc<AtomicU64>,
    rx: mpsc::Receiver<Command>,
}

impl StoreTask {
    async fn run(mut self) {
        tracing::debug!("store task started");
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Get { project, key, reply } => {
                    let result = self.document.entry(&project, &key).cloned();
                    let _ = reply.send(result);
                }
                Command::Put { op, value, reply } => {
                    let result = self.handle_put(op, value).await;
                    let _ = reply.send(result);
                }
                Command::Delete {
                    project,
                    key,
                    actor,
                    reply,
                } => {
                    let result = self.handle_delete(&project, &key, &actor).await;
                    let _ = reply.send(result);
                }
                Command::List {
                    project,
                    filter,
                    reply,
                } => {
                    let _ = reply.send(self.handle_list(&project, &filter));
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.document.clone());
                }
                Command::Restore {
                    document,
                    actor,
                    reply,
                } => {
                    let result = self.handle_restore(document, &actor).await;
                    let _ = reply.send(result);
                }
                Command::ListDue { before, reply } => {
                    let _ = reply.send(self.handle_list_due(before));
                }
                Command::Shutdown { reply } => {
                    let _ = reply.send(());
                    break;
                }
            }
        }
        tracing::debug!("store task stopped");
    }

    async fn handle_put(&mut self, op: PutOp, value: CipherValue) -> Result<PutOutcome> {
        let previous = self
            .document
            .projects
            .get(&op.project)
            .and_then(|p| p.secrets.get(&op.key))
            .map(|e| e.version());

        if let Some(expected) = op.expected_version {
            let actual = previous.unwrap_or(0);
            if actual != expected {
                return Err(VaultError::Conflict {
                    project: op.project.clone(),
                    key: op.key.clone(),
                    expected,
                    actual,
                });
            }
        }

        let backup = self.document.clone();
        let project = self
            .document
            .projects
            .entry(op.project.clone())
            .or_insert_with(Project::new);

        let version = match project.secrets.get_mut(&op.key) {
            Some(entry) => {
                if let Some(tags) = &op.tags {
                    entry.tags = tags.clone();
                }
                if let Some(rotation) = &op.rotation {
                    entry.rotation = rotation.clone();
                }
                entry.supersede(value, op.reason)
            }
            None => {
                let entry = SecretEntry::new(
                    value,
                    op.tags.clone().unwrap_or_default(),
                    op.rotation.clone().unwrap_or_default(),
                    op.reason,
                );
                let version = entry.version();
                project.secrets.insert(op.key.clone(), entry);
                version
            }
        };
        self.document.touch();

        let action = match op.reason {
            RevisionReason::Scheduled | RevisionReason::PolicyForced => AuditAction::Rotate,
            RevisionReason::Import => AuditAction::Import,
            RevisionReason::Manual => {
                if previous.is_some() {
                    AuditAction::Update
                } else {
                    AuditAction::Add
                }
            }
        };

        match self.persist().await {
            Ok(()) => {
                tracing::debug!(
                    project = %op.project,
                    key = %op.key,
                    version,
                    "put committed"
                );
                let mut record = AuditRecord::new(&op.actor, action, &op.project);
                record.key = Some(op.key.clone());
                record.before_version = previous;
                record.after_version = Some(version);
                self.audit(record);
                Ok(PutOutcome { version, previous })
            }
            Err(e) => {
                self.document = backup;
                let mut record =
                    AuditRecord::failure(&op.actor, action, &op.project, &e.to_string());
                record.key = Some(op.key.clone());
                record.before_version = previous;
                self.audit(record);
                Err(e)
            }
        }
    }

    async fn handle_delete(&mut self, project: &str, key: &str, actor: &str) -> Result<u32> {
        let version = self.document.entry(project, key)?.version();

        let backup = self.document.clone();
        if let Some(p) = self.document.projects.get_mut(project) {
            p.secrets.remove(key);
        }
        self.document.touch();

        match self.persist().await {
            Ok(()) => {
                tracing::debug!(project, key, version, "delete committed");
                let mut record = AuditRecord::new(actor, AuditAction::Delete, project);
                record.key = Some(key.to_string());
                record.before_version = Some(version);
                self.audit(record);
                Ok(version)
            }
            Err(e) => {
                self.document = backup;
                let mut record =
                    AuditRecord::failure(actor, AuditAction::Delete, project, &e.to_string());
                record.key = Some(key.to_string());
                record.before_version = Some(version);
                self.audit(record);
                Err(e)
            }
        }
    }

    fn handle_list(&self, project: &str, filter: &ListFilter) -> Result<Vec<SecretSummary>> {
        let p = self
            .document
            .projects
            .get(project)
            .ok_or_else(|| VaultError::ProjectNotFound(project.to_string()))?;

        Ok(p.secrets
            .iter()
            .filter(|(key, entry)| {
                if let Some(prefix) = &filter.key_prefix {
                    if !key.starts_with(prefix.as_str()) {
                        return false;
                    }
                }
                if let Some(tag) = &filter.tag {
                    if !entry.tags.contains(tag) {
                        return false;
                    }
                }
                true
            })
            .map(|(key, entry)| SecretSummary {
                key: key.clone(),
                version: entry.version(),
                tags: entry.tags.iter().cloned().collect(),
                rotation: entry.rotation.clone(),
                created_at: entry.created_at,
                modified_at: entry.modified_at,
                next_rotation_at: entry.next_rotation_at,
            })
            .collect())
    }

    async fn handle_restore(&mut self, document: VaultDocument, actor: &str) -> Result<()> {
        if document.version > DOCUMENT_VERSION {
            return Err(VaultError::Validation(format!(
                "backup document version {} is newer than supported version {}",
                document.version, DOCUMENT_VERSION
            )));
        }

        let backup = std::mem::replace(&mut self.document, document);
        self.document.touch();

        match self.persist().await {
            Ok(()) => {
                let mut record = AuditRecord::new(actor, AuditAction::Import, "*");
                record.detail = Some(format!(
                    "restore: {} secrets across {} projects",
                    self.document.secret_count(),
                    self.document.projects.len()
                ));
                self.audit(record);
                Ok(())
            }
            Err(e) => {
                self.document = backup;
                self.audit(AuditRecord::failure(
                    actor,
                    AuditAction::Import,
                    "*",
                    &e.to_string(),
                ));
                Err(e)
            }
        }
    }

    fn handle_list_due(&self, before: DateTime<Utc>) -> Vec<RotationTarget> {
        let mut due = Vec::new();
        for (project, p) in &self.document.projects {
            for (key, entry) in &p.secrets {
                if entry.is_due(before) {
                    due.push(RotationTarget {
                        project: project.clone(),
                        key: key.clone(),
                        next_rotation_at: entry.next_rotation_at.unwrap_or(before),
                    });
                }
            }
        }
        due
    }

    async fn persist(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.document)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        let path = &self.path;
        let io_timeout = self.io_timeout;
        retry(&self.retry, "persist vault document", || {
            write_atomic(path, &bytes, io_timeout)
        })
        .await
    }

    fn audit(&self, record: AuditRecord) {
        crate::audit::append_best_effort(self.sink.as_ref(), &self.audit_failures, record);
    }
}

/// Write `bytes` to `path` through a `.tmp` sibling and an atomic rename,
/// bounded by `io_timeout`.
async fn write_atomic(path: &Path, bytes: &[u8], io_timeout: Duration) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let write = async {
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| VaultError::StoreUnavailable(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| VaultError::StoreUnavailable(e.to_string()))?;
        Ok(())
    };
    match timeout(io_timeout, write).await {
        Ok(result) => result,
        Err(_) => Err(VaultError::StoreUnavailable(
            "vault write timed out".to_string(),
        )),
    }
}
