//! Per-backend persisted rate limiter.
//!
//! # Responsibilities
//! - Cap a backend to `rpm` / `rpd` across process restarts
//! - Sleep through short waits, fail fast on far-away daily resets
//! - Persist counters after every grant
//!
//! # Design Decisions
//! - The backend's state lock is held across waits, so acquisitions for one
//!   backend are strictly serialized and never pass a stale counter check
//! - A broken quota file degrades to in-memory counters; it never fails a caller

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::BackendConfig;
use crate::rate_limit::clock::{Clock, SystemClock};
use crate::rate_limit::state::{AcquireDecision, QuotaLimits, QuotaSlot, QuotaState};
use crate::rate_limit::store::QuotaStore;
use crate::rate_limit::QuotaError;

/// Snapshot of a limiter's counters after window refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub backend_id: String,
    pub limits: QuotaLimits,
    pub state: QuotaState,
}

impl QuotaStatus {
    pub fn minute_remaining(&self) -> u32 {
        self.limits.rpm.saturating_sub(self.state.minute_count)
    }

    pub fn day_remaining(&self) -> u32 {
        self.limits.rpd.saturating_sub(self.state.day_count)
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    backend_id: String,
    limits: QuotaLimits,
    max_day_wait: Duration,
    state: Mutex<QuotaState>,
    store: Arc<QuotaStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter, resuming whatever counters the store holds for `backend_id`.
    pub fn new(
        backend_id: impl Into<String>,
        limits: QuotaLimits,
        store: Arc<QuotaStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let backend_id = backend_id.into();
        let state = store.load_entry(&backend_id);
        tracing::debug!(
            backend = %backend_id,
            minute_count = state.minute_count,
            day_count = state.day_count,
            "Rate limiter state loaded"
        );
        Self {
            backend_id,
            limits,
            max_day_wait: Duration::from_secs(60),
            state: Mutex::new(state),
            store,
            clock,
        }
    }

    pub fn from_config(config: &BackendConfig, store: Arc<QuotaStore>) -> Self {
        Self::new(
            config.id.clone(),
            QuotaLimits { rpm: config.rpm, rpd: config.rpd },
            store,
            Arc::new(SystemClock),
        )
    }

    /// Override the longest daily wait that is slept through instead of failing.
    pub fn with_max_day_wait(mut self, max_day_wait: Duration) -> Self {
        self.max_day_wait = max_day_wait;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Take a slot, waiting for window rollover when needed.
    pub async fn acquire(&self) -> Result<QuotaSlot, QuotaError> {
        let mut state = self.state.lock().await;
        loop {
            let now = self.clock.now();
            match state.try_acquire(self.limits, now, self.max_day_wait) {
                AcquireDecision::Granted(slot) => {
                    if let Err(e) = self.store.save_entry(&self.backend_id, &state).await {
                        tracing::error!(
                            backend = %self.backend_id,
                            error = %e,
                            "Failed to persist quota state, continuing in memory"
                        );
                    }
                    return Ok(slot);
                }
                AcquireDecision::WaitRequired(wait) => {
                    tracing::debug!(
                        backend = %self.backend_id,
                        wait_ms = wait.as_millis() as u64,
                        minute_count = state.minute_count,
                        day_count = state.day_count,
                        "Rate limit reached, waiting for window"
                    );
                    self.clock.sleep(wait).await;
                }
                AcquireDecision::QuotaExceededFatal { resets_at, wait } => {
                    tracing::warn!(
                        backend = %self.backend_id,
                        wait_secs = wait.as_secs(),
                        "Daily quota exhausted"
                    );
                    return Err(QuotaError::DailyQuotaExceeded {
                        backend: self.backend_id.clone(),
                        resets_at,
                        wait,
                    });
                }
            }
        }
    }

    /// Current counters with elapsed windows reset. Does not consume or persist.
    pub async fn status(&self) -> QuotaStatus {
        let mut state = *self.state.lock().await;
        state.refresh(self.clock.now());
        QuotaStatus {
            backend_id: self.backend_id.clone(),
            limits: self.limits,
            state,
        }
    }
}
