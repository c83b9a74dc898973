//! Background scheduling loop.
//!
//! Every tick the scheduler asks the store which interval-policy entries
//! are past `next_rotation_at` and triggers a job for each. Triggering is
//! idempotent per target, so a scan that overlaps a still-running job
//! changes nothing.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::rotation::engine::RotationEngine;
use crate::rotation::job::JobTrigger;

pub struct Scheduler {
    engine: RotationEngine,
    tick: Duration,
}

impl Scheduler {
    pub fn new(engine: RotationEngine, config: &Config) -> Self {
        Self {
            engine,
            tick: Duration::from_secs(config.rotation.tick_secs.max(1)),
        }
    }

    /// Start the scan loop on its own task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(tick_secs = self.tick.as_secs(), "scheduler started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.scan().await,
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
    }

    /// One pass over the due list. Failures are logged and retried on the
    /// next tick rather than taking the loop down.
    async fn scan(&self) {
        let due = match self.engine.list_due(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "due scan failed");
                return;
            }
        };
        if due.is_empty() {
            return;
        }

        tracing::debug!(due = due.len(), "due scan");
        for target in due {
            self.engine
                .trigger(&target.project, &target.key, JobTrigger::Due);
        }
    }
}

/// Controls a spawned scheduler. Dropping the handle without calling
/// [`stop`](SchedulerHandle::stop) leaves the loop running.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the loop to exit. Jobs already
    /// triggered keep running to their terminal states.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
