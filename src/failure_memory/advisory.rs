//! ALLOW / WARN / BLOCK decision over recorded failures.

use std::fmt;

use serde::Serialize;

use crate::failure_memory::store::FailureRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisoryResult {
    Allow,
    Warn,
    Block,
}

impl fmt::Display for AdvisoryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryResult::Allow => write!(f, "ALLOW"),
            AdvisoryResult::Warn => write!(f, "WARN"),
            AdvisoryResult::Block => write!(f, "BLOCK"),
        }
    }
}

/// Retry counts at which an operation is warned about or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warn: u32,
    pub block: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { warn: 1, block: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub result: AdvisoryResult,
    pub reason: String,
    pub matched_record: Option<FailureRecord>,
    pub retry_count: u32,
}

impl Advisory {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            result: AdvisoryResult::Allow,
            reason: reason.into(),
            matched_record: None,
            retry_count: 0,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.result == AdvisoryResult::Block
    }

    /// Decide from the PENDING rows of one signature.
    ///
    /// With an environment hash only that environment's row counts; without
    /// one the worst row for the signature wins.
    pub fn evaluate(records: Vec<FailureRecord>, env_hash: Option<&str>, thresholds: Thresholds) -> Self {
        if records.is_empty() {
            return Self::allow("no recorded failures for this operation");
        }

        let candidates = records
            .into_iter()
            .filter(|r| env_hash.map(|env| r.env_snapshot_hash == env).unwrap_or(true));
        let Some(worst) = candidates.max_by_key(|r| r.retry_count) else {
            return Self::allow("failures recorded only in other environments");
        };

        let retry_count = worst.retry_count;
        let (result, reason) = if retry_count >= thresholds.block {
            (
                AdvisoryResult::Block,
                format!("failed {} times in this environment: {}", retry_count, worst.error_message),
            )
        } else if retry_count >= thresholds.warn {
            (
                AdvisoryResult::Warn,
                format!("failed {} time(s) before: {}", retry_count, worst.error_message),
            )
        } else {
            (AdvisoryResult::Allow, "below warning threshold".to_string())
        };

        Self {
            result,
            reason,
            matched_record: Some(worst),
            retry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure_memory::classify::ErrorType;
    use crate::failure_memory::store::EvolutionStatus;

    fn record(env: &str, retry_count: u32) -> FailureRecord {
        FailureRecord {
            id: 1,
            tool_signature: "sig".into(),
            env_snapshot_hash: env.into(),
            error_type: ErrorType::Hard,
            retry_count,
            created_at: 0.0,
            updated_at: 0.0,
            error_message: "exit status 1".into(),
            tool_name: "shell".into(),
            evolution_status: EvolutionStatus::Pending,
        }
    }

    #[test]
    fn test_escalation_by_retry_count() {
        let t = Thresholds::default();
        assert_eq!(Advisory::evaluate(vec![], Some("e"), t).result, AdvisoryResult::Allow);
        assert_eq!(Advisory::evaluate(vec![record("e", 1)], Some("e"), t).result, AdvisoryResult::Warn);
        assert_eq!(Advisory::evaluate(vec![record("e", 2)], Some("e"), t).result, AdvisoryResult::Warn);

        let blocked = Advisory::evaluate(vec![record("e", 3)], Some("e"), t);
        assert!(blocked.is_blocked());
        assert_eq!(blocked.retry_count, 3);
        assert!(blocked.reason.contains("exit status 1"));
    }

    #[test]
    fn test_other_environment_allows() {
        let advisory = Advisory::evaluate(vec![record("a", 5)], Some("b"), Thresholds::default());
        assert_eq!(advisory.result, AdvisoryResult::Allow);
        assert!(advisory.matched_record.is_none());
    }

    #[test]
    fn test_without_env_worst_row_wins() {
        let advisory = Advisory::evaluate(vec![record("a", 1), record("b", 4)], None, Thresholds::default());
        assert_eq!(advisory.result, AdvisoryResult::Block);
        assert_eq!(advisory.matched_record.map(|r| r.env_snapshot_hash), Some("b".to_string()));
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds { warn: 2, block: 5 };
        assert_eq!(Advisory::evaluate(vec![record("e", 1)], Some("e"), t).result, AdvisoryResult::Allow);
        assert_eq!(Advisory::evaluate(vec![record("e", 4)], Some("e"), t).result, AdvisoryResult::Warn);
    }
}
