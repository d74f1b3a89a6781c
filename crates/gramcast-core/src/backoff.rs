//! Adaptive pacing delay.
//!
//! The delay only ever grows within a process lifetime: once the platform
//! has complained, stay conservative for the rest of the run.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

pub struct BackoffController {
    multiplier: f64,
    jitter_max: Duration,
    delay: Mutex<Duration>,
}

impl BackoffController {
    pub fn new(initial: Duration, multiplier: f64, jitter_max: Duration) -> Self {
        Self {
            multiplier,
            jitter_max,
            delay: Mutex::new(initial),
        }
    }

    pub async fn current(&self) -> Duration {
        *self.delay.lock().await
    }

    /// Applies a platform cooldown signal:
    /// `delay = max(delay * multiplier, signaled)`.
    pub async fn on_cooldown_signal(&self, signaled: Duration) {
        let mut delay = self.delay.lock().await;
        let grown = delay.mul_f64(self.multiplier);
        *delay = grown.max(signaled);
    }

    /// Current delay plus a uniform random offset, so concurrent jobs do not
    /// fire in lockstep.
    pub async fn jittered_delay(&self) -> Duration {
        let base = self.current().await;
        let max_ms = self.jitter_max.as_millis() as u64;
        if max_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=max_ms);
        base + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cooldown_grows_by_multiplier() {
        let b = BackoffController::new(Duration::from_secs(10), 2.0, Duration::ZERO);
        b.on_cooldown_signal(Duration::from_secs(1)).await;
        assert_eq!(b.current().await, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn cooldown_takes_signaled_wait_when_larger() {
        let b = BackoffController::new(Duration::from_secs(10), 1.5, Duration::ZERO);
        b.on_cooldown_signal(Duration::from_secs(40)).await;
        assert_eq!(b.current().await, Duration::from_secs(40));
    }

    #[tokio::test]
    async fn delay_is_monotonic_across_signals() {
        let b = BackoffController::new(Duration::from_secs(5), 1.5, Duration::ZERO);
        let mut prev = b.current().await;
        for signaled in [1u64, 60, 2, 3, 120, 1] {
            b.on_cooldown_signal(Duration::from_secs(signaled)).await;
            let now = b.current().await;
            assert!(now >= prev, "delay shrank: {prev:?} -> {now:?}");
            prev = now;
        }
    }

    #[tokio::test]
    async fn jitter_stays_within_bound() {
        let b = BackoffController::new(Duration::from_secs(1), 2.0, Duration::from_millis(100));
        for _ in 0..50 {
            let d = b.jittered_delay().await;
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_millis(1100));
        }
    }
}
