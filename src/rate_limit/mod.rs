//! Persisted sliding-window rate limiting.
//!
//! # Data Flow
//! ```text
//! RateLimiter::acquire()
//!     → state.rs (refresh windows, decide Granted / WaitRequired / QuotaExceededFatal)
//!     → WaitRequired: clock.rs sleep, re-evaluate
//!     → Granted: store.rs (read-modify-write quota file, atomic replace)
//! ```
//!
//! # Design Decisions
//! - Single process, locally persisted; no cross-machine coordination
//! - One shared file, one entry per backend id
//! - Far-away daily resets are an explicit error, never a multi-hour sleep

pub mod clock;
pub mod limiter;
pub mod state;
pub mod store;

use std::time::Duration;
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{QuotaStatus, RateLimiter};
pub use state::{AcquireDecision, QuotaLimits, QuotaSlot, QuotaState};
pub use store::QuotaStore;

/// Errors from quota acquisition and persistence.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Daily quota used up; the window resets too far in the future to wait.
    #[error("daily quota for '{backend}' exhausted, resets in {}s", wait.as_secs())]
    DailyQuotaExceeded {
        backend: String,
        resets_at: f64,
        wait: Duration,
    },

    /// Quota file could not be written.
    #[error("quota store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Quota entries could not be serialized.
    #[error("quota store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
