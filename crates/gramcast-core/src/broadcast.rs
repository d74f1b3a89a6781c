//! Bulk message delivery across the destination listing.
//!
//! Each run computes one uniformly random permutation of the message set and
//! rotates through it, so variants spread evenly across destinations and the
//! starting variant differs between runs.

use std::{sync::Arc, time::Duration};

use rand::{seq::SliceRandom, Rng};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    errors::Error,
    pacing::sleep_unless_cancelled,
    platform::PlatformPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct BroadcastConfig {
    /// Hard per-run destination ceiling, independent of the daily migration quota.
    pub max_destinations: usize,
    pub base_delay: Duration,
    /// Elevated pause after a delivery failure; a failure may be an early
    /// warning of rate limiting even outside the migration path.
    pub failure_delay: Duration,
    pub jitter_max: Duration,
}

impl BroadcastConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_destinations: cfg.broadcast_cap,
            base_delay: cfg.base_delay,
            failure_delay: cfg.failure_delay,
            jitter_max: cfg.jitter_max,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

pub struct BroadcastEngine {
    platform: Arc<dyn PlatformPort>,
    cfg: BroadcastConfig,
}

impl BroadcastEngine {
    pub fn new(platform: Arc<dyn PlatformPort>, cfg: BroadcastConfig) -> Self {
        Self { platform, cfg }
    }

    /// Delivers one message per group destination, in listing order, until
    /// the list or the per-run cap is exhausted. Per-destination failures are
    /// counted and absorbed; only a failure to enumerate destinations at all
    /// propagates.
    pub async fn run(
        &self,
        messages: &[String],
        cancel: &CancellationToken,
    ) -> Result<BroadcastOutcome> {
        if messages.is_empty() {
            return Err(Error::Config("broadcast requires at least one message".to_string()));
        }

        let destinations = self.platform.list_destinations().await?;

        // One fixed permutation for the whole run.
        let mut rotation: Vec<&String> = messages.iter().collect();
        rotation.shuffle(&mut rand::thread_rng());

        let mut out = BroadcastOutcome::default();
        for dest in destinations.iter().filter(|d| d.is_group) {
            if out.sent >= self.cfg.max_destinations {
                println!(
                    "[BROADCAST] destination cap of {} reached, stopping",
                    self.cfg.max_destinations
                );
                break;
            }
            if cancel.is_cancelled() {
                break;
            }

            let msg = rotation[out.sent % rotation.len()];
            match self.platform.send_message(dest.chat_id, msg).await {
                Ok(()) => {
                    out.sent += 1;
                    println!("[BROADCAST] sent to {}", dest.title);
                    if !sleep_unless_cancelled(cancel, self.post_send_delay()).await {
                        break;
                    }
                }
                Err(e) => {
                    out.failed += 1;
                    eprintln!("[BROADCAST] failed in {}: {e}", dest.title);
                    if !sleep_unless_cancelled(cancel, self.cfg.failure_delay).await {
                        break;
                    }
                }
            }
        }

        Ok(out)
    }

    fn post_send_delay(&self) -> Duration {
        let max_ms = self.cfg.jitter_max.as_millis() as u64;
        if max_ms == 0 {
            return self.cfg.base_delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=max_ms);
        self.cfg.base_delay + Duration::from_millis(jitter)
    }
}
