//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! BackendConfig + concrete adapter (external)
//!     → managed.rs (adapter + breaker + limiter + health cache)
//!     → pool.rs (keyed by id, static priority order)
//!     → routing::Router walks the pool per request
//! ```
//!
//! # Design Decisions
//! - Adapters only implement attempt() and health(); admission state lives here
//! - Per-backend state, never shared between backends
//! - Pool is built once and passed by handle, no global registry

pub mod adapter;
pub mod managed;
pub mod pool;

pub use adapter::{AttemptError, AttemptResponse, BackendAdapter, BackendRequest, HealthStatus};
pub use managed::ManagedBackend;
pub use pool::BackendPool;
