//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard layer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Backend definitions, in declaration order.
    pub backends: Vec<BackendConfig>,

    /// Fallback routing settings.
    pub router: RouterConfig,

    /// Persisted rate limiter settings.
    pub rate_limit: RateLimitConfig,

    /// Failure memory (advisory store) settings.
    pub failure_memory: FailureMemoryConfig,

    /// Background health refresh settings.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GuardConfig {
    /// Backends sorted by static priority (ascending), ties kept in declaration order.
    pub fn backends_by_priority(&self) -> Vec<&BackendConfig> {
        let mut ordered: Vec<&BackendConfig> = self.backends.iter().collect();
        // sort_by_key is stable
        ordered.sort_by_key(|b| b.priority);
        ordered
    }
}

/// Per-backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Stable backend identifier. Key for all persisted state.
    pub id: String,

    /// Disabled backends are always skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Static priority (lower = tried earlier).
    #[serde(default)]
    pub priority: u32,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts within this backend before falling over.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Requests per minute.
    #[serde(default = "default_rpm")]
    pub rpm: u32,

    /// Requests per day.
    #[serde(default = "default_rpd")]
    pub rpd: u32,

    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_cb_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Seconds the breaker stays open before probing.
    #[serde(default = "default_cb_timeout")]
    pub circuit_breaker_timeout_secs: u64,

    /// Probe calls allowed while half-open.
    #[serde(default = "default_half_open")]
    pub half_open_max_calls: u32,

    /// Minimum seconds between two real `health()` calls.
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
}

impl BackendConfig {
    /// Config with every default filled in.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            priority: 0,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            rpm: default_rpm(),
            rpd: default_rpd(),
            circuit_breaker_threshold: default_cb_threshold(),
            circuit_breaker_timeout_secs: default_cb_timeout(),
            half_open_max_calls: default_half_open(),
            health_check_interval_secs: default_health_interval(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_rpm() -> u32 {
    60
}

fn default_rpd() -> u32 {
    1000
}

fn default_cb_threshold() -> u32 {
    5
}

fn default_cb_timeout() -> u64 {
    60
}

fn default_half_open() -> u32 {
    3
}

fn default_health_interval() -> u64 {
    30
}

/// Fallback router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Fall over to the remaining backends when the first choice fails.
    pub fallback_enabled: bool,

    /// Substrings (case-insensitive) marking an attempt error as non-retryable.
    pub non_retryable_patterns: Vec<String>,

    /// Base delay for exponential backoff between attempts, in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            non_retryable_patterns: crate::resilience::retries::DEFAULT_NON_RETRYABLE
                .iter()
                .map(|s| s.to_string())
                .collect(),
            backoff_base_ms: 200,
            backoff_max_ms: 5000,
        }
    }
}

/// Persisted rate limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Path of the shared quota file.
    pub state_path: PathBuf,

    /// Longest the limiter will sleep for a daily window before failing fast.
    pub max_day_wait_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(".backend-guard/rate_limits.json"),
            max_day_wait_secs: 60,
        }
    }
}

/// Failure memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FailureMemoryConfig {
    /// SQLite database path.
    pub db_path: PathBuf,

    /// `retry_count` at which `check` returns WARN.
    pub warn_threshold: u32,

    /// `retry_count` at which `check` returns BLOCK.
    pub block_threshold: u32,

    /// Lifetime of HARD records, in days since last update.
    pub hard_ttl_days: u64,

    /// Lifetime of SOFT records, in hours since last update.
    pub soft_ttl_hours: u64,

    /// Substrings (case-insensitive) classifying an error as SOFT.
    pub soft_patterns: Vec<String>,
}

impl FailureMemoryConfig {
    pub fn hard_ttl(&self) -> Duration {
        Duration::from_secs(self.hard_ttl_days * 86_400)
    }

    pub fn soft_ttl(&self) -> Duration {
        Duration::from_secs(self.soft_ttl_hours * 3_600)
    }
}

impl Default for FailureMemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".backend-guard/failure_memory.db"),
            warn_threshold: 1,
            block_threshold: 3,
            hard_ttl_days: 7,
            soft_ttl_hours: 1,
            soft_patterns: crate::failure_memory::classify::DEFAULT_SOFT_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Background health refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run the background refresher.
    pub active_enabled: bool,

    /// Refresh tick in seconds.
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            active_enabled: false,
            interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GuardConfig = toml::from_str(
            r#"
            [[backends]]
            id = "primary"
            "#,
        )
        .unwrap();

        let b = &config.backends[0];
        assert!(b.enabled);
        assert_eq!(b.max_retries, 3);
        assert_eq!(b.circuit_breaker_threshold, 5);
        assert_eq!(b.circuit_breaker_timeout_secs, 60);
        assert_eq!(b.half_open_max_calls, 3);
        assert!(config.router.fallback_enabled);
        assert_eq!(config.failure_memory.warn_threshold, 1);
        assert_eq!(config.failure_memory.block_threshold, 3);
        assert_eq!(config.failure_memory.hard_ttl(), Duration::from_secs(7 * 86_400));
        assert_eq!(config.failure_memory.soft_ttl(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut a = BackendConfig::new("a");
        a.priority = 2;
        let b = BackendConfig::new("b");
        let c = BackendConfig::new("c");
        let config = GuardConfig {
            backends: vec![a, b, c],
            ..Default::default()
        };

        let ids: Vec<&str> = config
            .backends_by_priority()
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
