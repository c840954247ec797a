//! Retry classification for backend attempt errors.
//!
//! # Responsibilities
//! - Decide if an attempt error is worth retrying on the same backend
//! - Keep the decision an explicit, ordered, data-driven rule list
//!
//! # Design Decisions
//! - Backend-fatal errors (credentials, authorization, quota, permission) stop
//!   retries on that backend but never block falling over to the next one
//! - Everything else (network, timeout, 5xx) is transient and retryable
//! - Substring matching is heuristic; provider wording varies and is matched as-is
//! - Independent from failure memory's HARD/SOFT rules

/// Default substrings marking an error as non-retryable.
pub const DEFAULT_NON_RETRYABLE: &[&str] = &[
    "invalid api key",
    "invalid_api_key",
    "bad credentials",
    "authentication",
    "unauthorized",
    "forbidden",
    "401",
    "403",
    "quota",
    "permission",
    "billing",
];

/// How an attempt error should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry on the same backend.
    Transient,
    /// Abandon this backend, fall over to the next.
    Fatal,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

/// Ordered substring rules. The first matching rule marks the error fatal.
#[derive(Debug, Clone)]
pub struct RetryRules {
    non_retryable: Vec<String>,
}

impl RetryRules {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            non_retryable: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// First pattern contained in `message`, if any.
    pub fn matching_rule(&self, message: &str) -> Option<&str> {
        let lower = message.to_lowercase();
        self.non_retryable
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn classify(&self, message: &str) -> ErrorClass {
        match self.matching_rule(message) {
            Some(_) => ErrorClass::Fatal,
            None => ErrorClass::Transient,
        }
    }
}

impl Default for RetryRules {
    fn default() -> Self {
        Self::new(DEFAULT_NON_RETRYABLE)
    }
}
