//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → GuardContext::from_config builds breakers, limiters, stores
//! ```
//!
//! # Design Decisions
//! - Config is owned by the caller and injected; nothing reads globals
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GuardConfig;
pub use schema::BackendConfig;
pub use schema::RouterConfig;
pub use schema::RateLimitConfig;
pub use schema::FailureMemoryConfig;
pub use schema::HealthConfig;
pub use schema::ObservabilityConfig;
