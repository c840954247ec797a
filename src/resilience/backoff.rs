//! Exponential backoff with jitter between attempts on the same backend.

use std::time::Duration;
use rand::Rng;

use crate::config::RouterConfig;

/// Backoff schedule: `base * 2^(attempt-1)`, capped at `max`, plus up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// No delay between attempts.
    pub const NONE: BackoffPolicy = BackoffPolicy {
        base: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.base.is_zero() {
            return Duration::ZERO;
        }

        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let exponential_base = 2u64.saturating_pow(attempt - 1);
        let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

        let jitter_range = capped_delay / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

impl From<&RouterConfig> for BackoffPolicy {
    fn from(config: &RouterConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}
