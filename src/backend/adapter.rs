//! The contract every concrete backend integration implements.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unit of work handed to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    /// Correlation id, logged with every attempt.
    pub id: Uuid,
    /// Opaque payload understood by the adapters.
    pub payload: serde_json::Value,
}

impl BackendRequest {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
        }
    }
}

/// Successful attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AttemptResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Failed attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// Backend reported an error; retryability is decided by message rules.
    #[error("{0}")]
    Backend(String),

    /// Adapter already knows retrying this backend is pointless.
    #[error("{0}")]
    Fatal(String),

    /// No answer within the deadline. Outcome unknown, counted as a failure.
    #[error("attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl AttemptError {
    pub fn backend(message: impl Into<String>) -> Self {
        AttemptError::Backend(message.into())
    }
}

/// Health reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
    Unknown,
}

impl HealthStatus {
    /// Only `Unavailable` excludes a backend; unknown and degraded still serve.
    pub fn is_usable(self) -> bool {
        !matches!(self, HealthStatus::Unavailable)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unavailable => "UNAVAILABLE",
            HealthStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One concrete backend integration (wire format and auth live behind this).
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Serve one request. `timeout` is advisory; the caller enforces it too.
    async fn attempt(&self, request: &BackendRequest, timeout: Duration) -> Result<AttemptResponse, AttemptError>;

    /// Probe backend health. Called at most once per health-check interval.
    async fn health(&self) -> HealthStatus;
}
