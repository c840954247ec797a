//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! GuardContext::spawn_health_monitor(&Shutdown)
//!     → task subscribed to the broadcast
//! Shutdown::trigger()
//!     → every subscribed task leaves its loop
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
