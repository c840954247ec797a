//! Timeout enforcement around backend attempts.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A timed-out attempt has an unknown outcome and counts as a failure

use std::future::Future;
use std::time::Duration;

use crate::backend::AttemptError;

/// Run `fut`, turning an elapsed deadline into `AttemptError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, AttemptError>
where
    F: Future<Output = Result<T, AttemptError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AttemptError::Timeout(limit)),
    }
}
