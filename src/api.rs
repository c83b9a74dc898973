//! High-level programmatic API for the envault engine.
//!
//! [`EnvaultClient`] wires config, gateway, store, and rotation engine
//! together over one vault directory. The CLI is a thin shell around this
//! facade; embedders use it directly and can plug their own rotation
//! strategies in through [`StrategyRegistry`].

use std::sync::Arc;

use secrecy::SecretString;

use crate::audit::{self, AuditRecord, AuditSink, FileAuditLog, NullAuditSink};
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::gateway::AgeGateway;
use crate::import::{self, ImportReport, Parsed};
use crate::rotation::job::{JobId, JobTrigger, RotationJob};
use crate::rotation::{Classifier, RotationEngine, Scheduler, SchedulerHandle, StrategyRegistry};
use crate::types::*;
use crate::vault::entry::SecretEntry;
use crate::vault::store::{ListFilter, PutOutcome, PutRequest, RotationTarget, SecretSummary, VaultStore};
use crate::vault::{self, VaultDocument};

/// One engine instance over one vault directory.
pub struct EnvaultClient {
    dir: PathBuf,
    config: Config,
    gateway: Arc<AgeGateway>,
    store: VaultStore,
    engine: RotationEngine,
    actor: String,
}

impl std::fmt::Debug for EnvaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvaultClient")
            .field("dir", &self.dir)
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

impl EnvaultClient {
    /// Initialize a fresh vault under `dir`: generate an identity, write a
    /// default config, and create an empty document.
    pub async fn init(dir: &Path) -> Result<Self> {
        let config = Config::default();
        config.save(&vault::config_path(dir))?;
        let gateway = Arc::new(AgeGateway::generate(&vault::identity_path(dir))?);

        let sink = build_sink(dir, &config, &gateway);
        let store = VaultStore::create(dir, gateway.clone(), Arc::clone(&sink), &config).await?;
        Self::assemble(dir, config, gateway, sink, store, None)
    }

    /// Open an existing vault under `dir` with the default strategies.
    pub async fn open(dir: &Path) -> Result<Self> {
        Self::open_with(dir, None).await
    }

    /// Open an existing vault with a caller-supplied strategy registry
    /// (custom generators/verifiers per classification).
    pub async fn open_with(dir: &Path, registry: Option<StrategyRegistry>) -> Result<Self> {
        if !vault::is_initialized(dir) {
            return Err(VaultError::VaultNotInitialized);
        }
        let config = Config::load(&vault::config_path(dir))?;
        let identity = match &config.gateway.identity {
            Some(path) => PathBuf::from(path),
            None => vault::identity_path(dir),
        };
        let gateway = Arc::new(AgeGateway::load(&identity)?);

        let sink = build_sink(dir, &config, &gateway);
        let store = VaultStore::open(dir, gateway.clone(), Arc::clone(&sink), &config).await?;
        Self::assemble(dir, config, gateway, sink, store, registry)
    }

    fn assemble(
        dir: &Path,
        config: Config,
        gateway: Arc<AgeGateway>,
        sink: Arc<dyn AuditSink>,
        store: VaultStore,
        registry: Option<StrategyRegistry>,
    ) -> Result<Self> {
        let registry = registry
            .unwrap_or_else(|| StrategyRegistry::with_defaults(config.rotation.generator_length));
        let classifier = Classifier::new(&config.classify)?;
        let engine = RotationEngine::new(
            store.clone(),
            Arc::new(registry),
            Arc::new(classifier),
            sink,
            &config,
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            gateway,
            store,
            engine,
            actor: "api".to_string(),
        })
    }

    /// Override the actor label recorded in audit entries.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Check whether a vault exists under `dir`.
    pub fn is_initialized(dir: &Path) -> bool {
        vault::is_initialized(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    // ── vault operations ─────────────────────────────────────────

    /// Fetch one entry (ciphertext and metadata, no plaintext).
    pub async fn get(&self, project: &str, key: &str) -> Result<SecretEntry> {
        self.store.get(project, key).await
    }

    /// Decrypt the active value of one secret.
    pub async fn get_value(&self, project: &str, key: &str) -> Result<SecretString> {
        self.store.decrypt_current(project, key).await
    }

    /// Decrypt a specific version, current or historical.
    pub async fn get_version(&self, project: &str, key: &str, number: u32) -> Result<SecretString> {
        self.store.decrypt_version(project, key, number).await
    }

    /// Create or overwrite a secret with default options.
    pub async fn put(&self, project: &str, key: &str, value: SecretString) -> Result<PutOutcome> {
        let mut request = PutRequest::new(project, key, value);
        request.actor = self.actor.clone();
        self.store.put(request).await
    }

    /// Create or overwrite a secret with full control over tags, policy,
    /// reason, and compare-and-set. The client's actor label is applied.
    pub async fn put_with(&self, mut request: PutRequest) -> Result<PutOutcome> {
        request.actor = self.actor.clone();
        self.store.put(request).await
    }

    /// Remove a secret. Returns the removed version number.
    pub async fn delete(&self, project: &str, key: &str) -> Result<u32> {
        self.store.delete(project, key, &self.actor).await
    }

    /// List secret metadata for one project, key-ascending.
    pub async fn list(&self, project: &str, filter: ListFilter) -> Result<Vec<SecretSummary>> {
        self.store.list(project, filter).await
    }

    /// Consistent point-in-time clone of the whole document.
    pub async fn snapshot(&self) -> Result<VaultDocument> {
        self.store.snapshot().await
    }

    // ── import / backup ──────────────────────────────────────────

    /// Parse dotenv text and apply it to one project.
    pub async fn import_text(&self, project: &str, text: &str, overwrite: bool) -> ImportReport {
        let parsed = import::parse(text);
        self.import_parsed(project, &parsed, overwrite).await
    }

    /// Apply already-parsed pairs to one project.
    pub async fn import_parsed(
        &self,
        project: &str,
        parsed: &Parsed,
        overwrite: bool,
    ) -> ImportReport {
        import::import(&self.store, project, parsed, overwrite, &self.actor).await
    }

    /// Serialize the whole document into an age-sealed MessagePack backup.
    pub async fn backup(&self) -> Result<Vec<u8>> {
        let document = self.snapshot().await?;
        let body =
            rmp_serde::to_vec(&document).map_err(|e| VaultError::Serialization(e.to_string()))?;
        self.gateway.seal(&body)
    }

    /// Replace the document from a backup produced by [`backup`](Self::backup).
    pub async fn restore_backup(&self, sealed: &[u8]) -> Result<()> {
        let body = self.gateway.unseal(sealed)?;
        let document: VaultDocument =
            rmp_serde::from_slice(&body).map_err(|e| VaultError::Serialization(e.to_string()))?;
        self.store.restore(document, &self.actor).await
    }

    // ── rotation ─────────────────────────────────────────────────

    /// Trigger a rotation for one target. Returns the id of the job
    /// started, or of the job already active for the target.
    pub fn trigger_rotation(&self, project: &str, key: &str) -> JobId {
        self.engine.trigger(project, key, JobTrigger::Manual)
    }

    /// Trigger a rotation and wait for its terminal state.
    pub async fn rotate(&self, project: &str, key: &str) -> Result<RotationJob> {
        let id = self.trigger_rotation(project, key);
        self.engine.wait(id).await
    }

    /// Point-in-time view of one job.
    pub fn job(&self, id: JobId) -> Option<RotationJob> {
        self.engine.job(id)
    }

    /// All retained jobs, oldest first.
    pub fn jobs(&self) -> Vec<RotationJob> {
        self.engine.jobs()
    }

    /// Request cancellation of a job; see [`RotationEngine::cancel`].
    pub fn cancel(&self, id: JobId) -> Result<bool> {
        self.engine.cancel(id)
    }

    /// Wait for a job to reach a terminal state.
    pub async fn wait(&self, id: JobId) -> Result<RotationJob> {
        self.engine.wait(id).await
    }

    /// Interval-policy entries due at or before `before`.
    pub async fn list_due(&self, before: DateTime<Utc>) -> Result<Vec<RotationTarget>> {
        self.engine.list_due(before).await
    }

    /// Start the background scheduler for this vault.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        Scheduler::new(self.engine.clone(), &self.config).spawn()
    }

    // ── audit ────────────────────────────────────────────────────

    /// Read all audit records from the log.
    pub fn audit_entries(&self) -> Result<Vec<AuditRecord>> {
        audit::read_entries(&vault::audit_path(&self.dir))
    }

    /// Verify the HMAC chain. Returns the number of records checked.
    pub fn verify_audit_chain(&self) -> Result<usize> {
        audit::verify_chain(&vault::audit_path(&self.dir), &self.gateway.audit_key())
    }

    /// Total audit appends that failed and were swallowed, across the
    /// store and the engine. Non-zero means the sink needs attention.
    pub fn audit_failures(&self) -> u64 {
        self.store.audit_failures() + self.engine.audit_failures()
    }

    /// Stop the store writer task. Queued operations finish first.
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

fn build_sink(dir: &Path, config: &Config, gateway: &AgeGateway) -> Arc<dyn AuditSink> {
    if config.audit.enabled {
        Arc::new(FileAuditLog::new(
            vault::audit_path(dir),
            gateway.audit_key(),
        ))
    } else {
        Arc::new(NullAuditSink)
    }
}
