//! Orchestrator facade: the entry points the command-intake layer calls.
//!
//! Owns the process-wide singletons (quota store, backoff controller, task
//! registry) and spawns each job as an independently cancellable task.
//! Unregistration happens after the engine returns on every exit path, so
//! the registry never holds a dangling job.

use std::{sync::Arc, time::Duration};

use crate::{
    backoff::BackoffController,
    broadcast::{BroadcastConfig, BroadcastEngine},
    config::Config,
    domain::{JobId, JobKind, JobStatus},
    errors::Error,
    migrate::{MigrationConfig, MigrationEngine},
    platform::{PlatformPort, StatusSink},
    quota::QuotaStore,
    registry::{JobRecord, TaskRegistry},
    schedule::Scheduler,
    Result,
};

#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    pub daily_count: u64,
    pub daily_limit: u64,
    pub current_delay: Duration,
    pub active_jobs: Vec<JobRecord>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Arc<Config>,
    platform: Arc<dyn PlatformPort>,
    sink: Arc<dyn StatusSink>,
    quota: Arc<QuotaStore>,
    backoff: Arc<BackoffController>,
    registry: TaskRegistry,
}

impl Orchestrator {
    pub fn new(
        cfg: Arc<Config>,
        platform: Arc<dyn PlatformPort>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let quota = Arc::new(QuotaStore::new(cfg.quota_file.clone()));
        let backoff = Arc::new(BackoffController::new(
            cfg.base_delay,
            cfg.backoff_multiplier,
            cfg.jitter_max,
        ));
        Self {
            inner: Arc::new(Inner {
                cfg,
                platform,
                sink,
                quota,
                backoff,
                registry: TaskRegistry::new(),
            }),
        }
    }

    pub async fn start_broadcast(&self, messages: Vec<String>) -> Result<JobId> {
        if messages.is_empty() {
            return Err(Error::Config("broadcast requires at least one message".to_string()));
        }

        let (id, cancel) = self.inner.registry.register(JobKind::Broadcast).await?;
        println!("[JOBS] {id} started ({} message variants)", messages.len());

        let this = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            let engine = BroadcastEngine::new(
                this.inner.platform.clone(),
                BroadcastConfig::from_config(&this.inner.cfg),
            );
            let status = match engine.run(&messages, &cancel).await {
                Ok(out) => {
                    let status = terminal_status(cancel.is_cancelled(), false);
                    this.notify(&format!(
                        "Broadcast {job_id} {}: sent {}, failed {}",
                        status.label(),
                        out.sent,
                        out.failed
                    ))
                    .await;
                    status
                }
                Err(e) => {
                    eprintln!("[JOBS] {job_id} failed: {e}");
                    this.notify(&format!("Broadcast {job_id} failed: {e}")).await;
                    JobStatus::Failed
                }
            };
            this.inner.registry.unregister(&job_id).await;
            println!("[JOBS] {job_id} {}", status.label());
        });

        Ok(id)
    }

    pub async fn start_schedule(
        &self,
        times: u32,
        interval: Duration,
        message: String,
    ) -> Result<JobId> {
        if times == 0 {
            return Err(Error::Config("schedule requires at least one repetition".to_string()));
        }
        if message.trim().is_empty() {
            return Err(Error::Config("schedule requires a message".to_string()));
        }

        let (id, cancel) = self
            .inner
            .registry
            .register(JobKind::ScheduledBroadcast)
            .await?;
        println!("[JOBS] {id} started ({times} repetitions)");

        let this = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            let scheduler = Scheduler::new(
                BroadcastEngine::new(
                    this.inner.platform.clone(),
                    BroadcastConfig::from_config(&this.inner.cfg),
                ),
                this.inner.sink.clone(),
            );
            let out = scheduler.run(times, interval, message, &cancel).await;
            let status = terminal_status(cancel.is_cancelled(), false);
            this.inner.registry.unregister(&job_id).await;
            println!(
                "[JOBS] {job_id} {} ({}/{times} repetitions)",
                status.label(),
                out.repetitions_completed
            );
        });

        Ok(id)
    }

    pub async fn start_migration(&self, source: String, target: String) -> Result<JobId> {
        let (id, cancel) = self.inner.registry.register(JobKind::Migration).await?;
        println!("[JOBS] {id} started ({source} -> {target})");

        let this = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            let engine = MigrationEngine::new(
                this.inner.platform.clone(),
                this.inner.sink.clone(),
                this.inner.quota.clone(),
                this.inner.backoff.clone(),
                MigrationConfig::from_config(&this.inner.cfg),
            );
            let out = engine.run(&source, &target, &cancel).await;
            let status = terminal_status(cancel.is_cancelled(), out.error.is_some());
            this.inner.registry.unregister(&job_id).await;
            println!(
                "[JOBS] {job_id} {} (added {}, remaining {})",
                status.label(),
                out.added,
                out.remaining
            );
        });

        Ok(id)
    }

    /// Non-blocking, idempotent. Returns whether the id was an active job.
    pub async fn cancel(&self, id: &JobId) -> bool {
        self.inner.registry.cancel(id).await
    }

    /// Emergency stop: cancels everything, leaves the registry empty.
    /// Safe to call with zero active jobs.
    pub async fn stop_all(&self) -> usize {
        let n = self.inner.registry.cancel_all(None).await;
        if n > 0 {
            println!("[JOBS] stop_all cancelled {n} jobs");
        }
        n
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let daily_count = match self.inner.quota.read().await {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[QUOTA] read failed in status ({e}), reporting 0");
                0
            }
        };
        StatusSnapshot {
            daily_count,
            daily_limit: self.inner.cfg.daily_limit,
            current_delay: self.inner.backoff.current().await,
            active_jobs: self.inner.registry.snapshot().await,
        }
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.inner.sink.notify(text).await {
            eprintln!("[JOBS] status notify failed: {e}");
        }
    }
}

/// Terminal status of a finished job. Cancellation wins over failure: an
/// engine stopped mid-run by the operator is cancelled, whatever state it
/// happened to be in.
fn terminal_status(cancelled: bool, failed: bool) -> JobStatus {
    if cancelled {
        JobStatus::Cancelled
    } else if failed {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    }
}
