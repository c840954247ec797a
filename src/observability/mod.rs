//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! breaker / limiter / router / failure memory
//!     → tracing events with structured fields (backend, attempt, error)
//!     → logging.rs subscriber (EnvFilter → fmt or JSON layer → stderr)
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted strings
//! - Request id flows through every dispatch event

pub mod logging;

pub use logging::init_logging;
