//! Dispatch outcome and attempt trace.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::HealthStatus;

/// Why a backend was passed over without being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    CircuitOpen,
    Unhealthy { status: HealthStatus },
    RateLimited { resets_at: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::CircuitOpen => write!(f, "circuit breaker open"),
            SkipReason::Unhealthy { status } => write!(f, "unhealthy ({})", status),
            SkipReason::RateLimited { resets_at } => {
                write!(f, "rate limited until {:.0}", resets_at)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedBackend {
    pub id: String,
    pub reason: SkipReason,
}

/// Outcome of one `Router::dispatch` call.
#[derive(Debug, Clone, Serialize)]
pub struct RouterResult {
    pub request_id: Uuid,
    pub success: bool,
    pub content: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Aggregate error when every candidate failed or was skipped.
    pub error: Option<String>,
    /// Backend that produced `content`.
    pub served_by: Option<String>,
    /// Backends that received at least one attempt, in order.
    pub attempted_backends: Vec<String>,
    /// Last error per attempted backend that did not succeed.
    pub attempted_errors: BTreeMap<String, String>,
    /// Backends passed over without an attempt.
    pub skipped: Vec<SkippedBackend>,
    /// True when the request went past the first candidate.
    pub fallback_used: bool,
}

impl RouterResult {
    pub(crate) fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            success: false,
            content: None,
            metadata: BTreeMap::new(),
            error: None,
            served_by: None,
            attempted_backends: Vec::new(),
            attempted_errors: BTreeMap::new(),
            skipped: Vec::new(),
            fallback_used: false,
        }
    }

    /// Convert to a `Result`, keeping the full trace in the error.
    pub fn into_result(self) -> Result<RouterResult, DispatchError> {
        if self.success {
            Ok(self)
        } else {
            Err(DispatchError::AllBackendsExhausted {
                attempted_errors: self.attempted_errors,
                skipped: self.skipped,
            })
        }
    }
}

/// Aggregate dispatch failure.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("{}", describe_exhaustion(attempted_errors, skipped))]
    AllBackendsExhausted {
        attempted_errors: BTreeMap<String, String>,
        skipped: Vec<SkippedBackend>,
    },
}

/// Human-readable summary of every attempted and skipped backend.
pub fn describe_exhaustion(attempted_errors: &BTreeMap<String, String>, skipped: &[SkippedBackend]) -> String {
    if attempted_errors.is_empty() && skipped.is_empty() {
        return "no backends available".to_string();
    }
    let mut parts: Vec<String> = attempted_errors
        .iter()
        .map(|(id, err)| format!("{}: {}", id, err))
        .collect();
    parts.extend(skipped.iter().map(|s| format!("{}: skipped, {}", s.id, s.reason)));
    format!("all backends failed ({})", parts.join("; "))
}
