//! Cross-restart failure memory.
//!
//! # Data Flow
//! ```text
//! Tool executor
//!     → FailureMemory::check(operation, params, env_hash?)
//!         → purge_expired (HARD: 7d, SOFT: 1h since last update)
//!         → PENDING rows for signature(operation, params)
//!         → Advisory::evaluate → ALLOW / WARN / BLOCK
//!     → run or refuse
//!     → record_failure (upsert, retry_count + 1) or clear_failure (RESOLVED)
//! ```
//!
//! # Design Decisions
//! - Rows are keyed by (signature, environment) so a failure in one
//!   checkout never blocks the same operation elsewhere
//! - Resolved and ignored rows stay for audit but never produce advisories
//! - A broken store degrades `check` to ALLOW; it never fails the caller
//! - rusqlite blocks, so async callers use the `*_async` methods, which run
//!   the same call on tokio's blocking pool

pub mod advisory;
pub mod classify;
pub mod signature;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::FailureMemoryConfig;
use crate::rate_limit::{Clock, SystemClock};

pub use advisory::{Advisory, AdvisoryResult, Thresholds};
pub use classify::{ErrorType, SoftRules};
pub use signature::{env_hash, signature};
pub use store::{EvolutionStatus, FailureRecord, FailureStats, FailureStore, NewFailure, StoreError};

#[derive(Debug, Clone)]
pub struct FailureMemory {
    store: Arc<FailureStore>,
    soft_rules: SoftRules,
    thresholds: Thresholds,
    hard_ttl: Duration,
    soft_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FailureMemory {
    pub fn new(store: FailureStore, config: &FailureMemoryConfig) -> Self {
        Self {
            store: Arc::new(store),
            soft_rules: SoftRules::new(&config.soft_patterns),
            thresholds: Thresholds {
                warn: config.warn_threshold,
                block: config.block_threshold,
            },
            hard_ttl: config.hard_ttl(),
            soft_ttl: config.soft_ttl(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Open the database named in the config.
    pub fn open(config: &FailureMemoryConfig) -> Result<Self, StoreError> {
        let store = FailureStore::open(&config.db_path)?;
        tracing::debug!(path = %config.db_path.display(), "Failure memory opened");
        Ok(Self::new(store, config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &FailureStore {
        &self.store
    }

    pub fn classify(&self, error_message: &str) -> ErrorType {
        self.soft_rules.classify(error_message)
    }

    /// Advisory for running `operation` with `params` again.
    pub fn check(&self, operation: &str, params: &Value, env_hash: Option<&str>) -> Advisory {
        if let Err(e) = self.purge_expired() {
            tracing::error!(error = %e, "Failure memory sweep failed, continuing with stale rows");
        }

        let sig = signature(operation, params);
        let records = match self.store.pending_for_signature(&sig) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(operation, error = %e, "Failure memory unreadable, allowing");
                return Advisory::allow(format!("failure memory unavailable: {}", e));
            }
        };

        let advisory = Advisory::evaluate(records, env_hash, self.thresholds);
        match advisory.result {
            AdvisoryResult::Block => {
                tracing::warn!(operation, retry_count = advisory.retry_count, "Operation blocked by failure memory")
            }
            AdvisoryResult::Warn => {
                tracing::warn!(operation, retry_count = advisory.retry_count, "Operation failed before")
            }
            AdvisoryResult::Allow => {}
        }
        advisory
    }

    /// Record one failure of `operation` in `env_hash`.
    pub fn record_failure(
        &self,
        operation: &str,
        params: &Value,
        env_hash: &str,
        error_message: &str,
    ) -> Result<FailureRecord, StoreError> {
        let sig = signature(operation, params);
        let error_type = self.classify(error_message);
        let record = self.store.upsert_failure(
            NewFailure {
                tool_signature: &sig,
                env_snapshot_hash: env_hash,
                tool_name: operation,
                error_type,
                error_message,
            },
            self.clock.now(),
        )?;
        tracing::debug!(
            operation,
            error_type = %record.error_type,
            retry_count = record.retry_count,
            "Failure recorded"
        );
        Ok(record)
    }

    /// Mark the matching record RESOLVED. Returns false when none existed.
    pub fn clear_failure(&self, operation: &str, params: &Value, env_hash: &str) -> Result<bool, StoreError> {
        self.set_status(operation, params, env_hash, EvolutionStatus::Resolved)
    }

    /// Mark the matching record IGNORED. Returns false when none existed.
    pub fn ignore_failure(&self, operation: &str, params: &Value, env_hash: &str) -> Result<bool, StoreError> {
        self.set_status(operation, params, env_hash, EvolutionStatus::Ignored)
    }

    fn set_status(
        &self,
        operation: &str,
        params: &Value,
        env_hash: &str,
        status: EvolutionStatus,
    ) -> Result<bool, StoreError> {
        let sig = signature(operation, params);
        let changed = self.store.set_status(&sig, env_hash, status, self.clock.now())?;
        if changed {
            tracing::debug!(operation, status = %status, "Failure record updated");
        }
        Ok(changed)
    }

    /// Record the outcome of a finished operation.
    pub fn record_outcome(
        &self,
        operation: &str,
        params: &Value,
        env_hash: &str,
        outcome: Result<(), &str>,
    ) -> Result<(), StoreError> {
        match outcome {
            Ok(()) => self.clear_failure(operation, params, env_hash).map(|_| ()),
            Err(message) => self.record_failure(operation, params, env_hash, message).map(|_| ()),
        }
    }

    /// Delete expired rows. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let deleted = self
            .store
            .purge_expired(self.clock.now(), self.hard_ttl, self.soft_ttl)?;
        if deleted > 0 {
            tracing::debug!(deleted, "Expired failure records purged");
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<FailureStats, StoreError> {
        self.store.stats()
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<FailureRecord>, StoreError> {
        self.store.recent(limit)
    }

    // Async wrappers: each runs the blocking call above via spawn_blocking.

    pub async fn check_async(&self, operation: &str, params: &Value, env_hash: Option<&str>) -> Advisory {
        let memory = self.clone();
        let operation = operation.to_string();
        let params = params.clone();
        let env_hash = env_hash.map(str::to_string);
        match tokio::task::spawn_blocking(move || memory.check(&operation, &params, env_hash.as_deref())).await {
            Ok(advisory) => advisory,
            Err(e) => {
                tracing::error!(error = %e, "Failure memory check task failed, allowing");
                Advisory::allow(format!("failure memory unavailable: {}", e))
            }
        }
    }

    pub async fn record_failure_async(
        &self,
        operation: &str,
        params: &Value,
        env_hash: &str,
        error_message: &str,
    ) -> Result<FailureRecord, StoreError> {
        let memory = self.clone();
        let operation = operation.to_string();
        let params = params.clone();
        let env_hash = env_hash.to_string();
        let error_message = error_message.to_string();
        tokio::task::spawn_blocking(move || memory.record_failure(&operation, &params, &env_hash, &error_message))
            .await?
    }

    pub async fn clear_failure_async(&self, operation: &str, params: &Value, env_hash: &str) -> Result<bool, StoreError> {
        self.set_status_async(operation, params, env_hash, EvolutionStatus::Resolved)
            .await
    }

    pub async fn ignore_failure_async(&self, operation: &str, params: &Value, env_hash: &str) -> Result<bool, StoreError> {
        self.set_status_async(operation, params, env_hash, EvolutionStatus::Ignored)
            .await
    }

    async fn set_status_async(
        &self,
        operation: &str,
        params: &Value,
        env_hash: &str,
        status: EvolutionStatus,
    ) -> Result<bool, StoreError> {
        let memory = self.clone();
        let operation = operation.to_string();
        let params = params.clone();
        let env_hash = env_hash.to_string();
        tokio::task::spawn_blocking(move || memory.set_status(&operation, &params, &env_hash, status)).await?
    }

    pub async fn record_outcome_async(
        &self,
        operation: &str,
        params: &Value,
        env_hash: &str,
        outcome: Result<(), &str>,
    ) -> Result<(), StoreError> {
        match outcome {
            Ok(()) => self.clear_failure_async(operation, params, env_hash).await.map(|_| ()),
            Err(message) => self
                .record_failure_async(operation, params, env_hash, message)
                .await
                .map(|_| ()),
        }
    }

    pub async fn purge_expired_async(&self) -> Result<usize, StoreError> {
        let memory = self.clone();
        tokio::task::spawn_blocking(move || memory.purge_expired()).await?
    }

    pub async fn stats_async(&self) -> Result<FailureStats, StoreError> {
        let memory = self.clone();
        tokio::task::spawn_blocking(move || memory.stats()).await?
    }

    pub async fn recent_async(&self, limit: usize) -> Result<Vec<FailureRecord>, StoreError> {
        let memory = self.clone();
        tokio::task::spawn_blocking(move || memory.recent(limit)).await?
    }
}
