//! Resilience and admission control for multi-backend dispatch.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ Router::dispatch(request, preferred?, fallback?)
//!                 │
//!                 ▼  for each candidate (preferred, then priority order)
//!          ┌───────────────────────────────────────────────┐
//!          │ ManagedBackend                                │
//!          │   check_available: enabled? breaker? health?  │
//!          │   RateLimiter::acquire  ──▶ quota file (JSON) │
//!          │   BackendAdapter::attempt (with timeout)      │
//!          │   CircuitBreaker::record_success / failure    │
//!          └───────────────────────────────────────────────┘
//!                 │
//!                 ▼
//!            RouterResult (served_by, attempted, skipped, errors)
//!
//!   tool executor ──▶ FailureMemory::check ──▶ ALLOW / WARN / BLOCK
//!                 ──▶ record_failure / clear_failure ──▶ SQLite
//! ```
//!
//! Everything is wired once by [`GuardContext`] and passed by reference.

// Shared plumbing
pub mod config;
pub mod lifecycle;
pub mod observability;

// Admission control
pub mod backend;
pub mod health;
pub mod rate_limit;
pub mod resilience;
pub mod routing;

// Advisory store
pub mod failure_memory;

pub mod context;

pub use backend::{AttemptError, AttemptResponse, BackendAdapter, BackendRequest, HealthStatus};
pub use config::GuardConfig;
pub use context::GuardContext;
pub use failure_memory::{Advisory, AdvisoryResult, FailureMemory};
pub use lifecycle::Shutdown;
pub use routing::{Router, RouterResult};
