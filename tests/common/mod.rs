//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use backend_guard::backend::{
    AttemptError, AttemptResponse, BackendAdapter, BackendPool, BackendRequest, HealthStatus, ManagedBackend,
};
use backend_guard::config::{BackendConfig, RouterConfig};
use backend_guard::rate_limit::{Clock, QuotaLimits, QuotaStore, RateLimiter};
use backend_guard::resilience::BackoffPolicy;
use backend_guard::routing::Router;

pub use backend_guard::rate_limit::ManualClock;

pub const T0: f64 = 1_700_000_000.0;

/// Programmable backend: scripted outcomes first, then a fixed default.
pub struct ScriptedBackend {
    name: String,
    calls: AtomicU32,
    script: Mutex<VecDeque<Result<String, AttemptError>>>,
    default: Mutex<Result<String, AttemptError>>,
    health: Mutex<HealthStatus>,
    health_hangs: AtomicBool,
}

impl ScriptedBackend {
    /// Always succeeds, answering with its own name.
    pub fn healthy(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicU32::new(0),
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(Ok(name.to_string())),
            health: Mutex::new(HealthStatus::Healthy),
            health_hangs: AtomicBool::new(false),
        })
    }

    /// Always fails with `error`.
    pub fn failing(name: &str, error: AttemptError) -> Arc<Self> {
        let backend = Self::healthy(name);
        *backend.default.lock().unwrap() = Err(error);
        backend
    }

    /// Queue outcomes served before the default.
    pub fn push(&self, outcome: Result<&str, AttemptError>) {
        self.script
            .lock()
            .unwrap()
            .push_back(outcome.map(str::to_string));
    }

    pub fn set_default(&self, outcome: Result<&str, AttemptError>) {
        *self.default.lock().unwrap() = outcome.map(str::to_string);
    }

    pub fn set_health(&self, status: HealthStatus) {
        *self.health.lock().unwrap() = status;
    }

    /// Make `health()` never return.
    pub fn hang_health(&self) {
        self.health_hangs.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    async fn attempt(&self, _request: &BackendRequest, _timeout: Duration) -> Result<AttemptResponse, AttemptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let outcome = next.unwrap_or_else(|| self.default.lock().unwrap().clone());
        outcome.map(AttemptResponse::new)
    }

    async fn health(&self) -> HealthStatus {
        if self.health_hangs.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        *self.health.lock().unwrap()
    }
}

/// Backend config with generous quotas so limits never interfere.
pub fn backend_config(id: &str, priority: u32) -> BackendConfig {
    let mut config = BackendConfig::new(id);
    config.priority = priority;
    config.rpm = 1000;
    config.rpd = 100_000;
    config
}

/// Managed backend sharing `store`, driven by `clock`.
pub fn managed(
    config: BackendConfig,
    adapter: Arc<ScriptedBackend>,
    store: Arc<QuotaStore>,
    clock: Arc<dyn Clock>,
) -> ManagedBackend {
    let limiter = RateLimiter::new(
        config.id.clone(),
        QuotaLimits { rpm: config.rpm, rpd: config.rpd },
        store,
        clock,
    );
    ManagedBackend::new(config, adapter, limiter)
}

/// Router over `backends` with backoff disabled.
pub fn router(dir: &Path, backends: Vec<(BackendConfig, Arc<ScriptedBackend>)>) -> Router {
    let store = Arc::new(QuotaStore::new(dir.join("quota.json")));
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(T0));
    let managed = backends
        .into_iter()
        .map(|(config, adapter)| managed(config, adapter, store.clone(), clock.clone()));
    Router::new(Arc::new(BackendPool::new(managed)), &RouterConfig::default()).with_backoff(BackoffPolicy::NONE)
}

pub fn request() -> BackendRequest {
    BackendRequest::new(serde_json::json!({"prompt": "hello"}))
}
