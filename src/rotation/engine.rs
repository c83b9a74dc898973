//! Rotation job execution.
//!
//! Each triggered rotation runs as its own task, walking the job state
//! machine and committing through the store. The engine guarantees at most
//! one active job per (project, key): triggering a target that already has
//! a live job returns that job's id instead of starting a second one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use crate::audit::{append_best_effort, AuditAction, AuditRecord, AuditSink};
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::rotation::classify::Classifier;
use crate::rotation::job::{JobId, JobState, JobTrigger, RotationJob};
use crate::rotation::strategy::{RotationContext, StrategyRegistry};
use crate::types::*;
use crate::vault::entry::RevisionReason;
use crate::vault::store::{PutRequest, RotationTarget, VaultStore};

const ENGINE_ACTOR: &str = "rotation-engine";

struct TrackedJob {
    job: RotationJob,
    cancel: Arc<AtomicBool>,
    completed_rx: watch::Receiver<bool>,
}

#[derive(Default)]
struct JobTable {
    /// Insertion order, oldest first. Drives `jobs()` output and pruning.
    order: Vec<JobId>,
    jobs: BTreeMap<JobId, TrackedJob>,
}

impl JobTable {
    fn active_for(&self, project: &str, key: &str) -> Option<JobId> {
        self.jobs
            .values()
            .find(|t| {
                !t.job.state.is_terminal() && t.job.project == project && t.job.key == key
            })
            .map(|t| t.job.id)
    }

    fn last_for(&self, project: &str, key: &str) -> Option<&RotationJob> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.jobs.get(id))
            .map(|t| &t.job)
            .find(|j| j.project == project && j.key == key)
    }

    fn insert(&mut self, tracked: TrackedJob) {
        self.order.push(tracked.job.id);
        self.jobs.insert(tracked.job.id, tracked);
    }

    /// Drop the oldest terminal jobs beyond `retain`. Active jobs are never
    /// pruned.
    fn prune(&mut self, retain: usize) {
        let terminal: Vec<JobId> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                self.jobs
                    .get(id)
                    .map(|t| t.job.state.is_terminal())
                    .unwrap_or(false)
            })
            .collect();
        let excess = terminal.len().saturating_sub(retain);
        for id in terminal.into_iter().take(excess) {
            self.jobs.remove(&id);
            self.order.retain(|x| *x != id);
        }
    }
}

#[derive(Clone)]
pub struct RotationEngine {
    store: VaultStore,
    registry: Arc<StrategyRegistry>,
    classifier: Arc<Classifier>,
    sink: Arc<dyn AuditSink>,
    hook_timeout: Duration,
    retain_jobs: usize,
    table: Arc<Mutex<JobTable>>,
    audit_failures: Arc<AtomicU64>,
}

impl RotationEngine {
    pub fn new(
        store: VaultStore,
        registry: Arc<StrategyRegistry>,
        classifier: Arc<Classifier>,
        sink: Arc<dyn AuditSink>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            registry,
            classifier,
            sink,
            hook_timeout: Duration::from_secs(config.rotation.hook_timeout_secs),
            retain_jobs: config.rotation.retain_jobs,
            table: Arc::new(Mutex::new(JobTable::default())),
            audit_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a rotation for one target, or return the id of the job already
    /// running for it.
    pub fn trigger(&self, project: &str, key: &str, trigger: JobTrigger) -> JobId {
        let mut table = self.table();
        if let Some(existing) = table.active_for(project, key) {
            tracing::debug!(
                job = %existing,
                project,
                key,
                "rotation already active for target"
            );
            return existing;
        }

        let mut job = RotationJob::new(project, key, trigger);
        job.attempt = match table.last_for(project, key) {
            Some(last) if last.state == JobState::Failed => last.attempt + 1,
            _ => 1,
        };
        let id = job.id;
        tracing::info!(
            job = %id,
            target = %job.target(),
            trigger = ?trigger,
            attempt = job.attempt,
            "rotation queued"
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let (completed_tx, completed_rx) = watch::channel(false);
        table.insert(TrackedJob {
            job,
            cancel: Arc::clone(&cancel),
            completed_rx,
        });
        table.prune(self.retain_jobs);
        drop(table);

        let engine = self.clone();
        tokio::spawn(engine.run_job(id, cancel, completed_tx));
        id
    }

    /// Point-in-time view of one job.
    pub fn job(&self, id: JobId) -> Option<RotationJob> {
        self.table().jobs.get(&id).map(|t| t.job.clone())
    }

    /// All retained jobs, oldest first.
    pub fn jobs(&self) -> Vec<RotationJob> {
        let table = self.table();
        table
            .order
            .iter()
            .filter_map(|id| table.jobs.get(id))
            .map(|t| t.job.clone())
            .collect()
    }

    /// Request cancellation. Honored only while the job is still pending or
    /// generating; returns `false` when it is too late.
    pub fn cancel(&self, id: JobId) -> Result<bool> {
        let table = self.table();
        let tracked = table
            .jobs
            .get(&id)
            .ok_or_else(|| VaultError::JobNotFound(id.to_string()))?;
        match tracked.job.state {
            JobState::Pending | JobState::Generating => {
                tracked.cancel.store(true, Ordering::Relaxed);
                tracing::info!(job = %id, "rotation cancel requested");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Wait for a job to reach a terminal state and return its final view.
    pub async fn wait(&self, id: JobId) -> Result<RotationJob> {
        let mut rx = {
            let table = self.table();
            let tracked = table
                .jobs
                .get(&id)
                .ok_or_else(|| VaultError::JobNotFound(id.to_string()))?;
            if tracked.job.state.is_terminal() {
                return Ok(tracked.job.clone());
            }
            tracked.completed_rx.clone()
        };

        loop {
            if *rx.borrow() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }

        self.job(id)
            .ok_or_else(|| VaultError::JobNotFound(id.to_string()))
    }

    /// Interval-policy entries due at or before `before`.
    pub async fn list_due(&self, before: DateTime<Utc>) -> Result<Vec<RotationTarget>> {
        self.store.list_due(before).await
    }

    /// Number of audit appends that failed and were swallowed.
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    async fn run_job(self, id: JobId, cancel: Arc<AtomicBool>, completed_tx: watch::Sender<bool>) {
        let (project, key, trigger) = {
            let table = self.table();
            match table.jobs.get(&id) {
                Some(t) => (t.job.project.clone(), t.job.key.clone(), t.job.trigger),
                None => return,
            }
        };

        match self.execute(id, &project, &key, trigger, &cancel).await {
            Ok(version) => {
                self.set_state(id, JobState::Committed, |job| {
                    job.new_version = Some(version);
                    job.completed_at = Some(Utc::now());
                });
                tracing::info!(job = %id, project, key, version, "rotation committed");
            }
            Err(e) => {
                let detail = e.to_string();
                self.set_state(id, JobState::Failed, |job| {
                    job.error = Some(detail.clone());
                    job.completed_at = Some(Utc::now());
                });
                tracing::warn!(job = %id, project, key, error = %detail, "rotation failed");

                let mut record =
                    AuditRecord::failure(ENGINE_ACTOR, AuditAction::Rotate, &project, &detail);
                record.key = Some(key.clone());
                append_best_effort(self.sink.as_ref(), &self.audit_failures, record);
            }
        }
        let _ = completed_tx.send(true);
    }

    async fn execute(
        &self,
        id: JobId,
        project: &str,
        key: &str,
        trigger: JobTrigger,
        cancel: &AtomicBool,
    ) -> Result<u32> {
        if cancel.load(Ordering::Relaxed) {
            return Err(cancelled());
        }

        // Resolve the target through the store; jobs hold no reference into
        // the document.
        let entry = self.store.get(project, key).await.map_err(|e| match e {
            VaultError::NotFound { project, key } => VaultError::TargetMissing { project, key },
            other => other,
        })?;
        let ctx = RotationContext {
            project: project.to_string(),
            key: key.to_string(),
            classification: self.classifier.classify(key).to_string(),
            current_version: entry.version(),
        };

        self.set_state(id, JobState::Generating, |_| {});
        if cancel.load(Ordering::Relaxed) {
            return Err(cancelled());
        }

        let generator = self.registry.generator(&ctx.classification);
        let candidate = match timeout(self.hook_timeout, generator.generate(&ctx)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e @ VaultError::GenerationFailure(_))) => return Err(e),
            Ok(Err(other)) => return Err(VaultError::GenerationFailure(other.to_string())),
            Err(_) => {
                return Err(VaultError::GenerationFailure(
                    "generator timed out".to_string(),
                ))
            }
        };

        // Last point where cancellation wins; from Staged on the job runs
        // to a terminal state.
        if cancel.load(Ordering::Relaxed) {
            return Err(cancelled());
        }
        self.set_state(id, JobState::Staged, |_| {});

        self.set_state(id, JobState::Verifying, |_| {});
        if let Some(verifier) = self.registry.verifier(&ctx.classification) {
            match timeout(self.hook_timeout, verifier.verify(&ctx, &candidate)).await {
                Ok(Ok(())) => {}
                Ok(Err(e @ VaultError::VerificationFailure(_))) => return Err(e),
                Ok(Err(other)) => return Err(VaultError::VerificationFailure(other.to_string())),
                Err(_) => {
                    return Err(VaultError::VerificationFailure(
                        "verifier timed out".to_string(),
                    ))
                }
            }
        }

        let mut request = PutRequest::new(project, key, candidate);
        request.reason = match trigger {
            JobTrigger::Due => RevisionReason::Scheduled,
            JobTrigger::Manual => RevisionReason::PolicyForced,
        };
        request.actor = ENGINE_ACTOR.to_string();
        let outcome = self.store.put(request).await?;
        Ok(outcome.version)
    }

    fn set_state<F>(&self, id: JobId, next: JobState, update: F)
    where
        F: FnOnce(&mut RotationJob),
    {
        let mut table = self.table();
        if let Some(tracked) = table.jobs.get_mut(&id) {
            debug_assert!(
                tracked.job.state.can_transition_to(next),
                "invalid transition {} -> {}",
                tracked.job.state,
                next
            );
            tracing::debug!(job = %id, from = %tracked.job.state, to = %next, "job state");
            tracked.job.state = next;
            update(&mut tracked.job);
        }
    }

    fn table(&self) -> MutexGuard<'_, JobTable> {
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn cancelled() -> VaultError {
    VaultError::Other("cancelled".to_string())
}
