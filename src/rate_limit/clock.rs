//! Time source for quota windows.
//!
//! Quota windows are wall-clock based (they must survive restarts), so the
//! limiter reads epoch seconds and sleeps through this trait. Tests swap in
//! a manual clock whose `sleep` advances time instantly.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real wall clock with tokio sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock. `sleep` advances the clock instead of waiting.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
    sleeps: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        Self {
            micros: AtomicU64::new((start_secs * 1_000_000.0) as u64),
            sleeps: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.micros.fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// Number of times `sleep` was called.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new(1_000.0);
        clock.sleep(Duration::from_millis(1500)).await;
        assert!((clock.now() - 1_001.5).abs() < 1e-6);
        assert_eq!(clock.sleep_count(), 1);
    }

    #[test]
    fn test_system_clock_is_epoch_based() {
        // 2020-01-01
        assert!(SystemClock.now() > 1_577_836_800.0);
    }
}
