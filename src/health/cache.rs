//! Cached backend health.
//!
//! `health()` on an adapter may be a network call, so its answer is cached
//! and refreshed at most once per interval. The lock is held during the
//! probe: concurrent callers wait for the one in flight instead of probing too.
//! A probe that outlives its deadline is cached as `Unavailable`, so a hung
//! health endpoint costs one deadline per interval rather than the dispatch.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::backend::{BackendAdapter, HealthStatus};

#[derive(Debug)]
pub struct HealthCache {
    interval: Duration,
    probe_timeout: Duration,
    last: Mutex<Option<(HealthStatus, Instant)>>,
}

impl HealthCache {
    pub fn new(interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            interval,
            probe_timeout,
            last: Mutex::new(None),
        }
    }

    /// Cached status if still fresh, otherwise probe the adapter.
    pub async fn get(&self, adapter: &dyn BackendAdapter) -> HealthStatus {
        let mut last = self.last.lock().await;
        if let Some((status, checked_at)) = *last {
            if checked_at.elapsed() < self.interval {
                return status;
            }
        }
        let status = self.probe(adapter).await;
        *last = Some((status, Instant::now()));
        status
    }

    /// Probe unconditionally and store the result.
    pub async fn refresh(&self, adapter: &dyn BackendAdapter) -> HealthStatus {
        let mut last = self.last.lock().await;
        let status = self.probe(adapter).await;
        *last = Some((status, Instant::now()));
        status
    }

    async fn probe(&self, adapter: &dyn BackendAdapter) -> HealthStatus {
        match tokio::time::timeout(self.probe_timeout, adapter.health()).await {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(timeout = ?self.probe_timeout, "Health probe timed out, marking unavailable");
                HealthStatus::Unavailable
            }
        }
    }

    /// Last known status without probing.
    pub async fn cached(&self) -> HealthStatus {
        let last = *self.last.lock().await;
        last.map(|(status, _)| status).unwrap_or(HealthStatus::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AttemptError, AttemptResponse, BackendRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingProbe {
        probes: AtomicU32,
    }

    #[async_trait]
    impl BackendAdapter for CountingProbe {
        async fn attempt(&self, _: &BackendRequest, _: Duration) -> Result<AttemptResponse, AttemptError> {
            Ok(AttemptResponse::default())
        }

        async fn health(&self) -> HealthStatus {
            self.probes.fetch_add(1, Ordering::SeqCst);
            HealthStatus::Healthy
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_at_most_once_per_interval() {
        let probe = CountingProbe::default();
        let cache = HealthCache::new(Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(cache.cached().await, HealthStatus::Unknown);

        for _ in 0..5 {
            assert_eq!(cache.get(&probe).await, HealthStatus::Healthy);
        }
        assert_eq!(probe.probes.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.get(&probe).await;
        assert_eq!(probe.probes.load(Ordering::SeqCst), 2);

        cache.refresh(&probe).await;
        assert_eq!(probe.probes.load(Ordering::SeqCst), 3);
    }

    struct HungProbe;

    #[async_trait]
    impl BackendAdapter for HungProbe {
        async fn attempt(&self, _: &BackendRequest, _: Duration) -> Result<AttemptResponse, AttemptError> {
            Ok(AttemptResponse::default())
        }

        async fn health(&self) -> HealthStatus {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_is_cached_as_unavailable() {
        let cache = HealthCache::new(Duration::from_secs(30), Duration::from_secs(2));
        let started = Instant::now();

        assert_eq!(cache.get(&HungProbe).await, HealthStatus::Unavailable);
        let probed_for = started.elapsed();
        assert!(probed_for >= Duration::from_secs(2) && probed_for < Duration::from_secs(3));

        // Served from cache until the interval passes.
        assert_eq!(cache.get(&HungProbe).await, HealthStatus::Unavailable);
        assert_eq!(started.elapsed(), probed_for);
        assert_eq!(cache.cached().await, HealthStatus::Unavailable);
    }
}
