//! Ordered-fallback router.
//!
//! # Responsibilities
//! - Pick the candidate order for a request (preferred first, then priority)
//! - Per candidate: admission checks, quota slot, attempt, retries
//! - Fall over on exhaustion and return one outcome with a full trace

use std::sync::Arc;

use crate::backend::{AttemptError, BackendPool, BackendRequest, ManagedBackend};
use crate::config::RouterConfig;
use crate::rate_limit::QuotaError;
use crate::resilience::{BackoffPolicy, ErrorClass, RetryRules};
use crate::routing::result::{describe_exhaustion, RouterResult, SkipReason, SkippedBackend};

/// How one backend's retry loop ended.
enum BackendOutcome {
    Served(crate::backend::AttemptResponse),
    /// At least one attempt reached the backend; last error kept.
    Failed(String),
    /// No attempt reached the backend.
    Skipped(SkipReason),
}

#[derive(Debug)]
pub struct Router {
    pool: Arc<BackendPool>,
    rules: RetryRules,
    backoff: BackoffPolicy,
    fallback_enabled: bool,
}

impl Router {
    pub fn new(pool: Arc<BackendPool>, config: &RouterConfig) -> Self {
        Self {
            pool,
            rules: RetryRules::new(&config.non_retryable_patterns),
            backoff: BackoffPolicy::from(config),
            fallback_enabled: config.fallback_enabled,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Fallback default used by [`Router::dispatch_default`].
    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    /// Candidate order for one request.
    ///
    /// A known preferred backend always comes first. With fallback the rest
    /// follow in static priority order; without it the order is the preferred
    /// backend alone, or the highest-priority enabled backend.
    pub fn select_order(&self, preferred: Option<&str>, fallback_enabled: bool) -> Vec<String> {
        let priority = self.pool.priority_order();
        let preferred = preferred.filter(|id| self.pool.contains(id));

        if !fallback_enabled {
            if let Some(id) = preferred {
                return vec![id.to_string()];
            }
            let first_enabled = priority
                .iter()
                .find(|id| self.pool.get(id).map(|b| b.config().enabled).unwrap_or(false))
                .or_else(|| priority.first());
            return first_enabled.map(|id| vec![id.clone()]).unwrap_or_default();
        }

        let mut order = Vec::with_capacity(priority.len());
        if let Some(id) = preferred {
            order.push(id.to_string());
        }
        for id in priority {
            if !order.contains(id) {
                order.push(id.clone());
            }
        }
        order
    }

    /// Dispatch using the configured fallback default.
    pub async fn dispatch_default(&self, request: &BackendRequest, preferred: Option<&str>) -> RouterResult {
        self.dispatch(request, preferred, self.fallback_enabled).await
    }

    /// Serve `request` from the first backend that succeeds.
    pub async fn dispatch(
        &self,
        request: &BackendRequest,
        preferred: Option<&str>,
        fallback_enabled: bool,
    ) -> RouterResult {
        let order = self.select_order(preferred, fallback_enabled);
        self.dispatch_order(request, &order).await
    }

    /// Walk an explicit candidate order.
    pub async fn dispatch_order(&self, request: &BackendRequest, order: &[String]) -> RouterResult {
        let mut result = RouterResult::new(request.id);

        for (position, id) in order.iter().enumerate() {
            let Some(backend) = self.pool.get(id) else {
                tracing::warn!(request_id = %request.id, backend = %id, "Unknown backend in order, ignoring");
                continue;
            };

            match self.run_backend(request, backend).await {
                BackendOutcome::Served(response) => {
                    result.attempted_backends.push(id.clone());
                    result.success = true;
                    result.served_by = Some(id.clone());
                    result.content = Some(response.content);
                    result.metadata = response.metadata;
                    result.fallback_used = position > 0;
                    if result.fallback_used {
                        tracing::info!(request_id = %request.id, backend = %id, "Served by fallback backend");
                    }
                    return result;
                }
                BackendOutcome::Failed(error) => {
                    tracing::warn!(request_id = %request.id, backend = %id, error = %error, "Backend exhausted, falling over");
                    result.attempted_backends.push(id.clone());
                    result.attempted_errors.insert(id.clone(), error);
                }
                BackendOutcome::Skipped(reason) => {
                    tracing::info!(request_id = %request.id, backend = %id, reason = %reason, "Backend skipped");
                    result.skipped.push(SkippedBackend { id: id.clone(), reason });
                }
            }
        }

        result.fallback_used = result.attempted_backends.len() + result.skipped.len() > 1;
        let summary = describe_exhaustion(&result.attempted_errors, &result.skipped);
        tracing::error!(request_id = %request.id, error = %summary, "Dispatch failed");
        result.error = Some(summary);
        result
    }

    /// Retry loop for a single backend.
    async fn run_backend(&self, request: &BackendRequest, backend: &ManagedBackend) -> BackendOutcome {
        if let Err(reason) = backend.check_available().await {
            return BackendOutcome::Skipped(reason);
        }

        let max_retries = backend.config().max_retries.max(1);
        let mut last_error: Option<String> = None;

        for attempt in 1..=max_retries {
            if attempt > 1 && !backend.breaker().can_execute() {
                tracing::debug!(backend = %backend.id(), attempt, "Circuit opened mid-retry, stopping");
                break;
            }

            if let Err(e) = backend.acquire().await {
                if let (QuotaError::DailyQuotaExceeded { resets_at, .. }, None) = (&e, &last_error) {
                    return BackendOutcome::Skipped(SkipReason::RateLimited { resets_at: *resets_at });
                }
                last_error = Some(e.to_string());
                break;
            }

            match backend.attempt(request).await {
                Ok(response) => return BackendOutcome::Served(response),
                Err(e) => {
                    let class = self.classify(&e);
                    tracing::warn!(
                        request_id = %request.id,
                        backend = %backend.id(),
                        attempt,
                        max_retries,
                        retryable = class.is_retryable(),
                        error = %e,
                        "Attempt failed"
                    );
                    last_error = Some(e.to_string());

                    if !class.is_retryable() {
                        break;
                    }
                    if attempt < max_retries {
                        let delay = self.backoff.delay(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        match last_error {
            Some(error) => BackendOutcome::Failed(error),
            // Breaker opened by a concurrent dispatch before our first attempt.
            None => BackendOutcome::Skipped(SkipReason::CircuitOpen),
        }
    }

    fn classify(&self, error: &AttemptError) -> ErrorClass {
        match error {
            AttemptError::Fatal(_) => ErrorClass::Fatal,
            AttemptError::Timeout(_) => ErrorClass::Transient,
            AttemptError::Backend(message) => self.rules.classify(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AttemptResponse, BackendAdapter, HealthStatus};
    use crate::config::BackendConfig;
    use crate::rate_limit::QuotaStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl BackendAdapter for Echo {
        async fn attempt(&self, _: &BackendRequest, _: Duration) -> Result<AttemptResponse, AttemptError> {
            Ok(AttemptResponse::new("ok"))
        }

        async fn health(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    fn router(specs: &[(&str, u32, bool)]) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(QuotaStore::new(dir.path().join("quota.json")));
        let backends = specs.iter().map(|(id, priority, enabled)| {
            let mut config = BackendConfig::new(*id);
            config.priority = *priority;
            config.enabled = *enabled;
            ManagedBackend::from_config(config, Arc::new(Echo), store.clone())
        });
        let pool = Arc::new(BackendPool::new(backends));
        (Router::new(pool, &RouterConfig::default()), dir)
    }

    #[test]
    fn test_select_order_preferred_first_then_priority() {
        let (router, _dir) = router(&[("a", 1, true), ("b", 0, true), ("c", 2, true)]);
        assert_eq!(router.select_order(None, true), vec!["b", "a", "c"]);
        assert_eq!(router.select_order(Some("c"), true), vec!["c", "b", "a"]);
        assert_eq!(router.select_order(Some("zzz"), true), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_select_order_without_fallback() {
        let (router, _dir) = router(&[("a", 0, false), ("b", 1, true)]);
        assert_eq!(router.select_order(Some("a"), false), vec!["a"]);
        assert_eq!(router.select_order(None, false), vec!["b"]);
        assert_eq!(router.select_order(Some("missing"), false), vec!["b"]);
    }

    #[tokio::test]
    async fn test_disabled_backend_is_skipped_with_reason() {
        let (router, _dir) = router(&[("a", 0, false), ("b", 1, true)]);
        let result = router.dispatch(&BackendRequest::new(serde_json::json!({})), None, true).await;

        assert!(result.success);
        assert_eq!(result.served_by.as_deref(), Some("b"));
        assert_eq!(result.attempted_backends, vec!["b"]);
        assert_eq!(result.skipped, vec![SkippedBackend { id: "a".into(), reason: SkipReason::Disabled }]);
        assert!(result.fallback_used);
    }
}
