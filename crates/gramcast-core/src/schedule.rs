//! Repeating broadcast driver.
//!
//! Runs a one-message broadcast up to `times` repetitions at a fixed
//! interval, under a hard 24-hour wall-clock ceiling from its own start.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    broadcast::BroadcastEngine,
    pacing::sleep_unless_cancelled,
    platform::StatusSink,
};

/// Safety cutoff independent of the `times` parameter.
const MAX_SCHEDULE_WALL_CLOCK: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduleOutcome {
    pub repetitions_completed: u32,
}

pub struct Scheduler {
    engine: BroadcastEngine,
    sink: Arc<dyn StatusSink>,
    ceiling: Duration,
}

impl Scheduler {
    pub fn new(engine: BroadcastEngine, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            engine,
            sink,
            ceiling: MAX_SCHEDULE_WALL_CLOCK,
        }
    }

    #[cfg(test)]
    fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub async fn run(
        &self,
        times: u32,
        interval: Duration,
        message: String,
        cancel: &CancellationToken,
    ) -> ScheduleOutcome {
        let deadline = Instant::now() + self.ceiling;
        let mut out = ScheduleOutcome::default();

        for rep in 1..=times {
            if cancel.is_cancelled() {
                self.report("Schedule cancelled").await;
                break;
            }
            if Instant::now() >= deadline {
                self.report(&format!(
                    "Schedule hit the 24h ceiling after {} of {times} repetitions",
                    out.repetitions_completed
                ))
                .await;
                break;
            }

            match self.engine.run(std::slice::from_ref(&message), cancel).await {
                Ok(b) => {
                    out.repetitions_completed += 1;
                    self.report(&format!(
                        "Scheduled broadcast {rep}/{times}: sent {}, failed {}",
                        b.sent, b.failed
                    ))
                    .await;
                }
                Err(e) => {
                    // One failed repetition stops the whole schedule; silently
                    // skipping ahead would hide a broken destination listing.
                    eprintln!("[SCHEDULE] repetition {rep} failed: {e}");
                    self.report(&format!("Schedule stopped at repetition {rep}: {e}"))
                        .await;
                    break;
                }
            }

            if rep < times {
                // Never sleep past the ceiling; the deadline check above
                // terminates the job right after the clamped pause.
                let pause = interval.min(deadline.saturating_duration_since(Instant::now()));
                if !sleep_unless_cancelled(cancel, pause).await {
                    self.report("Schedule cancelled").await;
                    break;
                }
            }
        }

        out
    }

    async fn report(&self, text: &str) {
        if let Err(e) = self.sink.notify(text).await {
            eprintln!("[SCHEDULE] status notify failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastConfig;
    use crate::domain::{ChatId, Destination, GroupRef, MemberCandidate};
    use crate::errors::Error;
    use crate::platform::{InviteOutcome, PlatformPort};
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakePlatform {
        groups: Vec<i64>,
        fail_listing: bool,
        sends: Mutex<usize>,
    }

    impl FakePlatform {
        fn new(groups: Vec<i64>) -> Self {
            Self {
                groups,
                fail_listing: false,
                sends: Mutex::new(0),
            }
        }

        fn send_count(&self) -> usize {
            *self.sends.lock().unwrap()
        }
    }

    #[async_trait]
    impl PlatformPort for FakePlatform {
        async fn resolve_group(&self, identifier: &str) -> Result<GroupRef> {
            Err(Error::Resolution(identifier.to_string()))
        }

        async fn list_members(&self, _group: &GroupRef) -> Result<Vec<MemberCandidate>> {
            Ok(vec![])
        }

        async fn list_destinations(&self) -> Result<Vec<Destination>> {
            if self.fail_listing {
                return Err(Error::Enumeration("listing unavailable".to_string()));
            }
            Ok(self
                .groups
                .iter()
                .map(|&id| Destination {
                    chat_id: ChatId(id),
                    is_group: true,
                    title: format!("group-{id}"),
                })
                .collect())
        }

        async fn send_message(&self, _destination: ChatId, _text: &str) -> Result<()> {
            *self.sends.lock().unwrap() += 1;
            Ok(())
        }

        async fn invite_member(
            &self,
            _target: &GroupRef,
            _member: &MemberCandidate,
        ) -> Result<InviteOutcome> {
            Ok(InviteOutcome::Added)
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

    fn zero_delay_cfg() -> BroadcastConfig {
        BroadcastConfig {
            max_destinations: 50,
            base_delay: Duration::ZERO,
            failure_delay: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn runs_the_requested_repetitions() {
        let platform = Arc::new(FakePlatform::new(vec![1, 2]));
        let sink = Arc::new(RecordingSink::default());
        let sched = Scheduler::new(
            BroadcastEngine::new(platform.clone(), zero_delay_cfg()),
            sink.clone(),
        );

        let out = sched
            .run(
                3,
                Duration::from_millis(1),
                "hi".to_string(),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(out.repetitions_completed, 3);
        assert_eq!(platform.send_count(), 6);
        assert_eq!(
            sink.notes()
                .iter()
                .filter(|n| n.contains("Scheduled broadcast"))
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_repetitions() {
        let platform = Arc::new(FakePlatform::new(vec![1]));
        let sink = Arc::new(RecordingSink::default());
        let sched = Scheduler::new(
            BroadcastEngine::new(platform.clone(), zero_delay_cfg()),
            sink.clone(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = sched
            .run(5, Duration::from_millis(1), "hi".to_string(), &cancel)
            .await;
        assert_eq!(out.repetitions_completed, 0);
        assert_eq!(platform.send_count(), 0);
        assert!(sink.notes().iter().any(|n| n.contains("cancelled")));
    }

    #[tokio::test]
    async fn a_failed_repetition_stops_the_schedule() {
        let mut platform = FakePlatform::new(vec![]);
        platform.fail_listing = true;
        let sink = Arc::new(RecordingSink::default());
        let sched = Scheduler::new(
            BroadcastEngine::new(Arc::new(platform), zero_delay_cfg()),
            sink.clone(),
        );

        let out = sched
            .run(
                3,
                Duration::from_millis(1),
                "hi".to_string(),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(out.repetitions_completed, 0);
        assert!(sink.notes().iter().any(|n| n.contains("stopped")));
    }

    #[tokio::test]
    async fn wall_clock_ceiling_cuts_the_schedule_short() {
        let platform = Arc::new(FakePlatform::new(vec![1]));
        let sink = Arc::new(RecordingSink::default());
        let sched = Scheduler::new(
            BroadcastEngine::new(platform.clone(), zero_delay_cfg()),
            sink.clone(),
        )
        .with_ceiling(Duration::from_millis(50));

        let out = sched
            .run(
                10,
                Duration::from_millis(200),
                "hi".to_string(),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(out.repetitions_completed, 1);
        assert!(sink.notes().iter().any(|n| n.contains("ceiling")));
    }

    #[tokio::test]
    async fn ceiling_clamps_a_long_inter_repetition_sleep() {
        let platform = Arc::new(FakePlatform::new(vec![1]));
        let sink = Arc::new(RecordingSink::default());
        let sched = Scheduler::new(
            BroadcastEngine::new(platform.clone(), zero_delay_cfg()),
            sink.clone(),
        )
        .with_ceiling(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let out = sched
            .run(
                10,
                Duration::from_secs(60),
                "hi".to_string(),
                &CancellationToken::new(),
            )
            .await;
        // The job must end at the cutoff, not one full interval later.
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(out.repetitions_completed, 1);
        assert!(sink.notes().iter().any(|n| n.contains("ceiling")));
    }
}
