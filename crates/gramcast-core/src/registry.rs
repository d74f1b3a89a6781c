//! In-flight job bookkeeping.
//!
//! Every orchestrator job registers here on start and unregisters on every
//! exit path. Migration jobs are capped at [`MAX_CONCURRENT_MIGRATIONS`];
//! broadcasts are not capped (they serialize themselves through pacing).

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{JobId, JobKind, JobStatus},
    errors::Error,
    Result,
};

pub const MAX_CONCURRENT_MIGRATIONS: usize = 3;

/// Read-only view of one registered job, for status reporting.
#[derive(Clone, Debug)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
}

struct JobEntry {
    kind: JobKind,
    cancel: CancellationToken,
    // Allocation number behind the id; snapshot ordering key.
    seq: u64,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    jobs: HashMap<String, JobEntry>,
}

#[derive(Default)]
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh job id and cancellation token. Fails with
    /// [`Error::Capacity`] when a fourth migration would be admitted.
    pub async fn register(&self, kind: JobKind) -> Result<(JobId, CancellationToken)> {
        let mut st = self.state.lock().await;

        if kind == JobKind::Migration {
            let active = st
                .jobs
                .values()
                .filter(|j| j.kind == JobKind::Migration)
                .count();
            if active >= MAX_CONCURRENT_MIGRATIONS {
                return Err(Error::Capacity {
                    active,
                    max: MAX_CONCURRENT_MIGRATIONS,
                });
            }
        }

        st.next_id += 1;
        let id = JobId(format!("{}-{}", kind.label(), st.next_id));
        let cancel = CancellationToken::new();
        let seq = st.next_id;
        st.jobs.insert(
            id.0.clone(),
            JobEntry {
                kind,
                cancel: cancel.clone(),
                seq,
            },
        );
        Ok((id, cancel))
    }

    /// Sets the job's cancel signal without waiting for it to stop.
    /// Idempotent; unknown ids are a no-op. Returns whether the id was known.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let st = self.state.lock().await;
        match st.jobs.get(&id.0) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every registered job (optionally filtered by kind) and drops
    /// the matching entries, so the registry is empty immediately after an
    /// emergency stop. The jobs themselves observe the signal at their next
    /// checkpoint; their own `unregister` becomes a no-op.
    pub async fn cancel_all(&self, filter: Option<JobKind>) -> usize {
        let mut st = self.state.lock().await;
        let mut cancelled = 0usize;
        st.jobs.retain(|_, entry| {
            let matches = filter.map(|k| entry.kind == k).unwrap_or(true);
            if matches {
                entry.cancel.cancel();
                cancelled += 1;
            }
            !matches
        });
        cancelled
    }

    pub async fn unregister(&self, id: &JobId) {
        let mut st = self.state.lock().await;
        st.jobs.remove(&id.0);
    }

    /// Read-only view in registration order. Everything still registered is
    /// running; terminal statuses are reported by the job itself on exit.
    pub async fn snapshot(&self) -> Vec<JobRecord> {
        let st = self.state.lock().await;
        let mut entries: Vec<(&String, &JobEntry)> = st.jobs.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(id, entry)| JobRecord {
                id: JobId(id.clone()),
                kind: entry.kind,
                status: JobStatus::Running,
            })
            .collect()
    }
}
