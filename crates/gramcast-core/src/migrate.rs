//! Member migration: copies members from a source group into a target group
//! in bounded batches, gated on the daily quota and paced by the shared
//! backoff delay.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    backoff::BackoffController,
    config::Config,
    domain::MemberCandidate,
    pacing::sleep_unless_cancelled,
    platform::{InviteOutcome, PlatformPort, StatusSink},
    quota::QuotaStore,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct MigrationConfig {
    pub daily_limit: u64,
    pub batch_size: usize,
}

impl MigrationConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            daily_limit: cfg.daily_limit,
            batch_size: cfg.batch_size,
        }
    }
}

/// Result of one migration run. A run never propagates an error past its own
/// boundary; fatal conditions land in `error` so the orchestrator stays up.
#[derive(Clone, Debug, Default)]
pub struct MigrationOutcome {
    pub added: u64,
    pub remaining: u64,
    pub error: Option<String>,
}

pub struct MigrationEngine {
    platform: Arc<dyn PlatformPort>,
    sink: Arc<dyn StatusSink>,
    quota: Arc<QuotaStore>,
    backoff: Arc<BackoffController>,
    cfg: MigrationConfig,
}

impl MigrationEngine {
    pub fn new(
        platform: Arc<dyn PlatformPort>,
        sink: Arc<dyn StatusSink>,
        quota: Arc<QuotaStore>,
        backoff: Arc<BackoffController>,
        cfg: MigrationConfig,
    ) -> Self {
        Self {
            platform,
            sink,
            quota,
            backoff,
            cfg,
        }
    }

    pub async fn run(
        &self,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> MigrationOutcome {
        match self.run_inner(source, target, cancel).await {
            Ok(out) => out,
            Err(e) => {
                eprintln!("[MIGRATE] run failed: {e}");
                self.report(&format!("Migration failed: {e}")).await;
                MigrationOutcome {
                    error: Some(e.to_string()),
                    ..MigrationOutcome::default()
                }
            }
        }
    }

    async fn run_inner(
        &self,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<MigrationOutcome> {
        let source = self.platform.resolve_group(source).await?;
        let target = self.platform.resolve_group(target).await?;

        // Snapshot once; never refetched mid-run. Bots are dropped here,
        // deleted/self accounts are skipped per candidate without quota.
        let candidates: Vec<MemberCandidate> = self
            .platform
            .list_members(&source)
            .await?
            .into_iter()
            .filter(|m| !m.is_bot)
            .collect();
        let eligible = candidates
            .iter()
            .filter(|m| !m.is_deleted && !m.is_self)
            .count() as u64;

        println!(
            "[MIGRATE] {} -> {}: {} candidates ({} eligible)",
            source.title,
            target.title,
            candidates.len(),
            eligible
        );

        let limit = self.cfg.daily_limit;
        let mut added = 0u64;
        let mut idx = 0usize;

        'run: while idx < candidates.len() {
            if cancel.is_cancelled() {
                self.report("Migration cancelled").await;
                break;
            }

            let count = self.quota_count().await;
            if count >= limit {
                self.report(&format!("Daily limit reached ({count}/{limit}), stopping"))
                    .await;
                break;
            }

            let end = (idx + self.cfg.batch_size).min(candidates.len());
            self.report(&format!(
                "Migrating {} -> {}: {} members left, {count}/{limit} added today",
                source.title,
                target.title,
                candidates.len() - idx
            ))
            .await;

            for member in &candidates[idx..end] {
                if cancel.is_cancelled() {
                    self.report("Migration cancelled").await;
                    break 'run;
                }
                if member.is_deleted || member.is_self {
                    continue;
                }
                if self.quota_count().await >= limit {
                    // Abandon the rest of the batch; what was added stays added.
                    self.report(&format!("Daily limit of {limit} reached, stopping"))
                        .await;
                    break 'run;
                }

                match self.platform.invite_member(&target, member).await {
                    Ok(InviteOutcome::Added) => {
                        added += 1;
                        if let Err(e) = self.quota.increment().await {
                            eprintln!("[QUOTA] persist failed after add: {e}");
                        }
                        println!("[MIGRATE] added {}", member.display());
                        let pause = self.backoff.jittered_delay().await;
                        if !sleep_unless_cancelled(cancel, pause).await {
                            self.report("Migration cancelled").await;
                            break 'run;
                        }
                    }
                    Ok(InviteOutcome::Cooldown(wait)) => {
                        // Honor the signalled wait exactly; the candidate that
                        // triggered it is not retried.
                        self.backoff.on_cooldown_signal(wait).await;
                        println!(
                            "[MIGRATE] cooldown signalled, waiting {}s",
                            wait.as_secs()
                        );
                        if !sleep_unless_cancelled(cancel, wait).await {
                            self.report("Migration cancelled").await;
                            break 'run;
                        }
                    }
                    Ok(InviteOutcome::PrivacyRestricted) => {
                        // Ineligible, not a failure; no quota consumed.
                    }
                    Err(e) => {
                        eprintln!("[MIGRATE] failed to add {}: {e}", member.display());
                    }
                }
            }

            idx = end;
            if idx < candidates.len() {
                // Long inter-batch pause that scales with how conservative
                // the backoff has become.
                let pause = self.backoff.current().await * self.cfg.batch_size as u32;
                if !sleep_unless_cancelled(cancel, pause).await {
                    self.report("Migration cancelled").await;
                    break;
                }
            }
        }

        let remaining = eligible.saturating_sub(added);
        self.report(&format!(
            "Migration finished: {added} added, {remaining} remaining"
        ))
        .await;

        Ok(MigrationOutcome {
            added,
            remaining,
            error: None,
        })
    }

    /// Quota reads degrade to "0 today" on persistence failure instead of
    /// killing the run.
    async fn quota_count(&self) -> u64 {
        match self.quota.read().await {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[QUOTA] read failed ({e}), assuming 0");
                0
            }
        }
    }

    async fn report(&self, text: &str) {
        if let Err(e) = self.sink.notify(text).await {
            eprintln!("[MIGRATE] status notify failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, Destination, GroupRef, UserId};
    use crate::errors::Error;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedPlatform {
        members: Vec<MemberCandidate>,
        // Per-invite scripted outcomes; `Added` once exhausted.
        outcomes: Mutex<VecDeque<Result<InviteOutcome>>>,
        attempts: Mutex<Vec<i64>>,
    }

    impl ScriptedPlatform {
        fn new(members: Vec<MemberCandidate>) -> Self {
            Self {
                members,
                outcomes: Mutex::new(VecDeque::new()),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn script(self, outcomes: Vec<Result<InviteOutcome>>) -> Self {
            *self.outcomes.lock().unwrap() = outcomes.into();
            self
        }

        fn attempts(&self) -> Vec<i64> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlatformPort for ScriptedPlatform {
        async fn resolve_group(&self, identifier: &str) -> Result<GroupRef> {
            match identifier {
                "src" => Ok(GroupRef {
                    chat_id: ChatId(-100),
                    title: "src".to_string(),
                }),
                "dst" => Ok(GroupRef {
                    chat_id: ChatId(-200),
                    title: "dst".to_string(),
                }),
                other => Err(Error::Resolution(other.to_string())),
            }
        }

        async fn list_members(&self, _group: &GroupRef) -> Result<Vec<MemberCandidate>> {
            Ok(self.members.clone())
        }

        async fn list_destinations(&self) -> Result<Vec<Destination>> {
            Ok(vec![])
        }

        async fn send_message(&self, _destination: ChatId, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn invite_member(
            &self,
            _target: &GroupRef,
            member: &MemberCandidate,
        ) -> Result<InviteOutcome> {
            self.attempts.lock().unwrap().push(member.user_id.0);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(InviteOutcome::Added))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        notes: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn notes(&self) -> Vec<String> {
            self.notes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn notify(&self, text: &str) -> Result<()> {
            self.notes.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn member(id: i64) -> MemberCandidate {
        MemberCandidate {
            user_id: UserId(id),
            username: None,
            is_bot: false,
            is_self: false,
            is_deleted: false,
        }
    }

    fn quota_store(name: &str) -> Arc<QuotaStore> {
        let path =
            std::env::temp_dir().join(format!("gramcast-migrate-{name}-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        Arc::new(QuotaStore::new(path))
    }

    fn zero_backoff() -> Arc<BackoffController> {
        Arc::new(BackoffController::new(Duration::ZERO, 1.5, Duration::ZERO))
    }

    fn engine(
        platform: Arc<ScriptedPlatform>,
        sink: Arc<RecordingSink>,
        quota: Arc<QuotaStore>,
        backoff: Arc<BackoffController>,
        daily_limit: u64,
        batch_size: usize,
    ) -> MigrationEngine {
        MigrationEngine::new(
            platform,
            sink,
            quota,
            backoff,
            MigrationConfig {
                daily_limit,
                batch_size,
            },
        )
    }

    #[tokio::test]
    async fn stops_at_daily_limit_mid_batch() {
        // limit 5, 3 already consumed today, 10 eligible: exactly 2 adds.
        let quota = quota_store("limit");
        quota.increment_and_persist(3).await.unwrap();

        let platform = Arc::new(ScriptedPlatform::new((1..=10).map(member).collect()));
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(platform.clone(), sink.clone(), quota.clone(), zero_backoff(), 5, 10);

        let out = eng.run("src", "dst", &CancellationToken::new()).await;
        assert_eq!(out.added, 2);
        assert_eq!(out.remaining, 8);
        assert!(out.error.is_none());
        assert_eq!(platform.attempts().len(), 2);
        assert_eq!(quota.read().await.unwrap(), 5);
        assert!(sink.notes().iter().any(|n| n.contains("Daily limit")));
    }

    #[tokio::test]
    async fn cooldown_grows_backoff_and_skips_the_triggering_member() {
        let backoff = zero_backoff();
        let platform = Arc::new(
            ScriptedPlatform::new(vec![member(1), member(2)]).script(vec![Ok(
                InviteOutcome::Cooldown(Duration::from_millis(40)),
            )]),
        );
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(
            platform.clone(),
            sink,
            quota_store("cooldown"),
            backoff.clone(),
            50,
            10,
        );

        let out = eng.run("src", "dst", &CancellationToken::new()).await;
        // delay = max(0 * 1.5, 40ms) = the signalled wait.
        assert_eq!(backoff.current().await, Duration::from_millis(40));
        // Member 1 was attempted once and not retried; member 2 proceeded.
        assert_eq!(platform.attempts(), vec![1, 2]);
        assert_eq!(out.added, 1);
        assert_eq!(out.remaining, 1);
    }

    #[tokio::test]
    async fn privacy_restriction_skips_without_quota() {
        let quota = quota_store("privacy");
        let platform = Arc::new(
            ScriptedPlatform::new(vec![member(1), member(2)])
                .script(vec![Ok(InviteOutcome::PrivacyRestricted)]),
        );
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(platform.clone(), sink, quota.clone(), zero_backoff(), 50, 10);

        let out = eng.run("src", "dst", &CancellationToken::new()).await;
        assert_eq!(out.added, 1);
        assert_eq!(quota.read().await.unwrap(), 1);
        assert_eq!(platform.attempts(), vec![1, 2]);
    }

    #[tokio::test]
    async fn bots_deleted_and_self_are_never_attempted() {
        let mut bot = member(1);
        bot.is_bot = true;
        let mut deleted = member(2);
        deleted.is_deleted = true;
        let mut me = member(3);
        me.is_self = true;

        let platform = Arc::new(ScriptedPlatform::new(vec![bot, deleted, me, member(4)]));
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(platform.clone(), sink, quota_store("skip"), zero_backoff(), 50, 10);

        let out = eng.run("src", "dst", &CancellationToken::new()).await;
        assert_eq!(platform.attempts(), vec![4]);
        assert_eq!(out.added, 1);
        assert_eq!(out.remaining, 0);
    }

    #[tokio::test]
    async fn per_member_errors_never_abort_the_batch() {
        let platform = Arc::new(
            ScriptedPlatform::new(vec![member(1), member(2)])
                .script(vec![Err(Error::External("boom".to_string()))]),
        );
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(platform.clone(), sink, quota_store("besteffort"), zero_backoff(), 50, 10);

        let out = eng.run("src", "dst", &CancellationToken::new()).await;
        assert_eq!(platform.attempts(), vec![1, 2]);
        assert_eq!(out.added, 1);
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn bad_identifier_is_reported_not_propagated() {
        let platform = Arc::new(ScriptedPlatform::new(vec![member(1)]));
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(platform, sink.clone(), quota_store("badid"), zero_backoff(), 50, 10);

        let out = eng.run("nope", "dst", &CancellationToken::new()).await;
        assert_eq!(out.added, 0);
        assert!(out.error.is_some());
        assert!(sink.notes().iter().any(|n| n.contains("failed")));
    }

    #[tokio::test]
    async fn cancellation_is_observed_at_the_batch_checkpoint() {
        let platform = Arc::new(ScriptedPlatform::new(vec![member(1), member(2)]));
        let sink = Arc::new(RecordingSink::default());
        let eng = engine(platform.clone(), sink.clone(), quota_store("cancel"), zero_backoff(), 50, 10);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = eng.run("src", "dst", &cancel).await;
        assert!(platform.attempts().is_empty());
        assert_eq!(out.added, 0);
        assert!(out.error.is_none());
        assert!(sink.notes().iter().any(|n| n.contains("cancelled")));
    }
}
