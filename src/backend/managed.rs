//! A backend together with its admission state.
//!
//! # Responsibilities
//! - Own one adapter, one circuit breaker, one rate limiter, one health cache
//! - Answer "may this backend take traffic now?" with a skip reason if not
//! - Run one attempt under the backend's timeout and feed the breaker
//!
//! # Design Decisions
//! - Breaker outcome is recorded only once the attempt resolves
//! - An attempt dropped mid-flight has an unknown outcome and counts as a failure

use std::sync::Arc;

use crate::backend::{AttemptError, AttemptResponse, BackendAdapter, BackendRequest};
use crate::config::BackendConfig;
use crate::health::HealthCache;
use crate::rate_limit::{QuotaSlot, QuotaError, QuotaStore, RateLimiter};
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::routing::SkipReason;

pub struct ManagedBackend {
    config: BackendConfig,
    adapter: Arc<dyn BackendAdapter>,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    health: HealthCache,
}

impl ManagedBackend {
    pub fn new(config: BackendConfig, adapter: Arc<dyn BackendAdapter>, limiter: RateLimiter) -> Self {
        let breaker = CircuitBreaker::new(config.id.clone(), CircuitBreakerConfig::from(&config));
        let health = HealthCache::new(config.health_check_interval(), config.timeout());
        Self {
            config,
            adapter,
            breaker,
            limiter,
            health,
        }
    }

    /// Build with a limiter on the shared quota store and the system clock.
    pub fn from_config(config: BackendConfig, adapter: Arc<dyn BackendAdapter>, store: Arc<QuotaStore>) -> Self {
        let limiter = RateLimiter::from_config(&config, store);
        Self::new(config, adapter, limiter)
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn health(&self) -> &HealthCache {
        &self.health
    }

    pub fn adapter(&self) -> &dyn BackendAdapter {
        self.adapter.as_ref()
    }

    /// Ok if the backend may take traffic now.
    ///
    /// Checks are ordered cheapest first: config flag, breaker, cached health.
    pub async fn check_available(&self) -> Result<(), SkipReason> {
        if !self.config.enabled {
            return Err(SkipReason::Disabled);
        }
        if !self.breaker.can_execute() {
            return Err(SkipReason::CircuitOpen);
        }
        let status = self.health.get(self.adapter.as_ref()).await;
        if !status.is_usable() {
            return Err(SkipReason::Unhealthy { status });
        }
        Ok(())
    }

    /// Take a quota slot for one attempt.
    pub async fn acquire(&self) -> Result<QuotaSlot, QuotaError> {
        self.limiter.acquire().await
    }

    /// Send one attempt and record its outcome on the breaker.
    pub async fn attempt(&self, request: &BackendRequest) -> Result<AttemptResponse, AttemptError> {
        let timeout = self.config.timeout();
        let mut in_flight = InFlight::new(&self.breaker);

        let result = with_timeout(timeout, self.adapter.attempt(request, timeout)).await;
        in_flight.disarm();

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }
}

impl std::fmt::Debug for ManagedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBackend")
            .field("id", &self.config.id)
            .field("enabled", &self.config.enabled)
            .field("priority", &self.config.priority)
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

/// Records a breaker failure if dropped before the attempt resolved.
struct InFlight<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self { breaker, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.record_failure();
        }
    }
}
