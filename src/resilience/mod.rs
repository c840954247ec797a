//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt on a backend:
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → On failure: retries.rs (transient or backend-fatal?)
//!     → backoff.rs (jittered delay before the next attempt)
//!     → circuit_breaker.rs (track failures, open circuit if threshold exceeded)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Fatal errors skip remaining retries but still allow fallback
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retries::{ErrorClass, RetryRules};
