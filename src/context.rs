//! Explicit wiring of every guard component.
//!
//! # Responsibilities
//! - Build the quota store, managed backends, pool, router and failure memory
//!   once from config
//! - Hand them out by reference; nothing is global
//!
//! # Design Decisions
//! - Adapters are supplied by the caller; a configured backend without an
//!   adapter is logged and left out of the pool
//! - A failure-memory database that cannot be opened falls back to an
//!   in-memory one so routing still works

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::backend::{BackendAdapter, BackendPool, ManagedBackend};
use crate::config::GuardConfig;
use crate::failure_memory::{FailureMemory, FailureStore, StoreError};
use crate::health::HealthMonitor;
use crate::lifecycle::Shutdown;
use crate::rate_limit::{Clock, QuotaStore, RateLimiter, SystemClock};
use crate::routing::Router;

#[derive(Debug)]
pub struct GuardContext {
    config: GuardConfig,
    quota_store: Arc<QuotaStore>,
    pool: Arc<BackendPool>,
    router: Router,
    failure_memory: FailureMemory,
}

impl GuardContext {
    pub fn from_config(
        config: GuardConfig,
        adapters: HashMap<String, Arc<dyn BackendAdapter>>,
    ) -> Result<Self, StoreError> {
        Self::with_clock(config, adapters, Arc::new(SystemClock))
    }

    /// Build with an explicit time source for quotas and failure TTLs.
    pub fn with_clock(
        config: GuardConfig,
        mut adapters: HashMap<String, Arc<dyn BackendAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let quota_store = Arc::new(QuotaStore::new(&config.rate_limit.state_path));
        let max_day_wait = Duration::from_secs(config.rate_limit.max_day_wait_secs);

        let mut backends = Vec::with_capacity(config.backends.len());
        for backend_config in config.backends_by_priority() {
            let Some(adapter) = adapters.remove(&backend_config.id) else {
                tracing::warn!(backend = %backend_config.id, "No adapter registered for backend, skipping");
                continue;
            };
            let limiter = RateLimiter::from_config(backend_config, quota_store.clone())
                .with_max_day_wait(max_day_wait)
                .with_clock(clock.clone());
            backends.push(ManagedBackend::new(backend_config.clone(), adapter, limiter));
        }
        for id in adapters.keys() {
            tracing::warn!(backend = %id, "Adapter has no backend config, ignoring");
        }

        let pool = Arc::new(BackendPool::new(backends));
        let router = Router::new(pool.clone(), &config.router);

        let failure_memory = match FailureMemory::open(&config.failure_memory) {
            Ok(memory) => memory,
            Err(e) => {
                tracing::error!(
                    path = %config.failure_memory.db_path.display(),
                    error = %e,
                    "Failure memory unavailable, using in-memory store"
                );
                FailureMemory::new(FailureStore::open_in_memory()?, &config.failure_memory)
            }
        }
        .with_clock(clock);

        tracing::info!(
            backends = pool.len(),
            order = ?pool.priority_order(),
            fallback_enabled = config.router.fallback_enabled,
            "Guard context ready"
        );

        Ok(Self {
            config,
            quota_store,
            pool,
            router,
            failure_memory,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn quota_store(&self) -> &Arc<QuotaStore> {
        &self.quota_store
    }

    pub fn failure_memory(&self) -> &FailureMemory {
        &self.failure_memory
    }

    /// Start the active health refresher if enabled.
    pub fn spawn_health_monitor(&self, shutdown: &Shutdown) -> Option<JoinHandle<()>> {
        if !self.config.health.active_enabled {
            return None;
        }
        let monitor = HealthMonitor::new(self.pool.clone(), self.config.health.clone());
        Some(tokio::spawn(monitor.run(shutdown.subscribe())))
    }
}
