//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend identity (non-empty, unique)
//! - Validate value ranges (retries, quotas, thresholds, TTLs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::GuardConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::new("backends", "at least one backend is required"));
    }

    let mut seen = HashSet::new();
    for (i, b) in config.backends.iter().enumerate() {
        let field = |name: &str| format!("backends[{}].{}", i, name);

        if b.id.trim().is_empty() {
            errors.push(ValidationError::new(field("id"), "must not be empty"));
        } else if !seen.insert(b.id.as_str()) {
            errors.push(ValidationError::new(field("id"), format!("duplicate backend id '{}'", b.id)));
        }
        if b.max_retries == 0 {
            errors.push(ValidationError::new(field("max_retries"), "must be at least 1"));
        }
        if b.rpm == 0 {
            errors.push(ValidationError::new(field("rpm"), "must be at least 1"));
        }
        if b.rpd < b.rpm {
            errors.push(ValidationError::new(field("rpd"), "must be >= rpm"));
        }
        if b.timeout_secs == 0 {
            errors.push(ValidationError::new(field("timeout_secs"), "must be > 0"));
        }
        if b.circuit_breaker_threshold == 0 {
            errors.push(ValidationError::new(field("circuit_breaker_threshold"), "must be at least 1"));
        }
        if b.half_open_max_calls == 0 {
            errors.push(ValidationError::new(field("half_open_max_calls"), "must be at least 1"));
        }
    }

    let fm = &config.failure_memory;
    if fm.warn_threshold == 0 {
        errors.push(ValidationError::new("failure_memory.warn_threshold", "must be at least 1"));
    }
    if fm.block_threshold < fm.warn_threshold {
        errors.push(ValidationError::new(
            "failure_memory.block_threshold",
            "must be >= warn_threshold",
        ));
    }
    if fm.hard_ttl_days == 0 {
        errors.push(ValidationError::new("failure_memory.hard_ttl_days", "must be > 0"));
    }
    if fm.soft_ttl_hours == 0 {
        errors.push(ValidationError::new("failure_memory.soft_ttl_hours", "must be > 0"));
    }

    if config.router.backoff_max_ms < config.router.backoff_base_ms {
        errors.push(ValidationError::new("router.backoff_max_ms", "must be >= backoff_base_ms"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
