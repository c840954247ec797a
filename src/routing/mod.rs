//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Router::dispatch(request, preferred?, fallback_enabled)
//!     → select_order (preferred first, remaining by static priority)
//!     → for each candidate:
//!         check_available (disabled / breaker / cached health) → skip
//!         for attempt in 1..=max_retries:
//!             RateLimiter::acquire → BackendAdapter::attempt → breaker
//!             fatal error → next backend; transient → backoff, retry
//!     → first success returns; otherwise aggregate failure (result.rs)
//! ```
//!
//! # Design Decisions
//! - Deterministic order: same pool and preference always yield the same chain
//! - Every skip and failure is kept in the trace, never silently dropped
//! - Fatal errors stop retries on a backend but never block fallback

pub mod result;
pub mod router;

pub use result::{DispatchError, RouterResult, SkipReason, SkippedBackend};
pub use router::Router;
