//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Inline (cache.rs):
//!     Router asks ManagedBackend::check_available()
//!     → cached status if younger than health_check_interval
//!     → else adapter.health(), cached
//!
//! Active refresh (active.rs, optional):
//!     Periodic timer
//!     → refresh every backend's cache
//! ```
//!
//! # Design Decisions
//! - Health is per-backend, not per-pool
//! - Unknown and degraded backends still take traffic; only unavailable is skipped
//! - The breaker, not health, reacts to request failures

pub mod active;
pub mod cache;

pub use active::HealthMonitor;
pub use cache::HealthCache;
