//! HARD/SOFT classification of recorded failures.
//!
//! SOFT failures look environmental and transient, so they expire quickly.
//! Everything else is HARD. Substring matching is heuristic; the list is
//! configurable and checked in order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SOFT_PATTERNS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "network",
    "rate limit",
    "502",
    "503",
    "504",
    "disk",
    "space",
    "permission denied",
    "unavailable",
    "refused",
    "temporary",
    "retry",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Hard,
    Soft,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Hard => "HARD",
            ErrorType::Soft => "SOFT",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HARD" => Ok(ErrorType::Hard),
            "SOFT" => Ok(ErrorType::Soft),
            other => Err(format!("unknown error type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoftRules {
    patterns: Vec<String>,
}

impl SoftRules {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, error_message: &str) -> ErrorType {
        let lower = error_message.to_lowercase();
        if self.patterns.iter().any(|p| lower.contains(p.as_str())) {
            ErrorType::Soft
        } else {
            ErrorType::Hard
        }
    }
}

impl Default for SoftRules {
    fn default() -> Self {
        Self::new(DEFAULT_SOFT_PATTERNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_messages_are_soft() {
        let rules = SoftRules::default();
        assert_eq!(rules.classify("Connection reset by peer"), ErrorType::Soft);
        assert_eq!(rules.classify("HTTP 503 Service Unavailable"), ErrorType::Soft);
        assert_eq!(rules.classify("No space left on device"), ErrorType::Soft);
        assert_eq!(rules.classify("Permission denied (os error 13)"), ErrorType::Soft);
    }

    #[test]
    fn test_everything_else_is_hard() {
        let rules = SoftRules::default();
        assert_eq!(rules.classify("SyntaxError: unexpected token"), ErrorType::Hard);
        assert_eq!(rules.classify("file not found"), ErrorType::Hard);
    }

    #[test]
    fn test_custom_patterns_replace_defaults() {
        let rules = SoftRules::new(&["flaky"]);
        assert_eq!(rules.classify("FLAKY test"), ErrorType::Soft);
        assert_eq!(rules.classify("connection refused"), ErrorType::Hard);
    }

    #[test]
    fn test_error_type_round_trips_through_text() {
        assert_eq!("SOFT".parse::<ErrorType>().unwrap(), ErrorType::Soft);
        assert!("soft".parse::<ErrorType>().is_err());
    }
}
