//! Quota counters across limiter instances sharing one file.

use std::sync::Arc;
use std::time::Duration;

use backend_guard::rate_limit::{Clock, QuotaError, QuotaLimits, QuotaStore, RateLimiter};

mod common;
use common::{ManualClock, T0};

fn limiter(path: &std::path::Path, id: &str, limits: QuotaLimits, clock: Arc<ManualClock>) -> RateLimiter {
    RateLimiter::new(id, limits, Arc::new(QuotaStore::new(path)), clock)
}

#[tokio::test]
async fn test_fresh_limiter_resumes_counts_and_windows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate_limits.json");
    let clock = Arc::new(ManualClock::new(T0));
    let limits = QuotaLimits { rpm: 10, rpd: 100 };

    let first = limiter(&path, "alpha", limits, clock.clone());
    first.acquire().await.unwrap();
    clock.advance(Duration::from_secs(10));
    first.acquire().await.unwrap();
    clock.advance(Duration::from_secs(10));
    first.acquire().await.unwrap();
    drop(first);

    let resumed = limiter(&path, "alpha", limits, clock.clone());
    let status = resumed.status().await;
    assert_eq!(status.state.minute_count, 3);
    assert_eq!(status.state.day_count, 3);
    assert_eq!(status.state.minute_window_start, T0);
    assert_eq!(status.state.day_window_start, T0);
    assert_eq!(status.state.last_request_time, T0 + 20.0);

    // The minute window still closes at T0 + 60, not 60s after the reload.
    clock.advance(Duration::from_secs(41));
    let slot = resumed.acquire().await.unwrap();
    assert_eq!(slot.minute_count, 1);
    assert_eq!(slot.day_count, 4);
}

#[tokio::test]
async fn test_entries_for_other_backends_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate_limits.json");
    let clock = Arc::new(ManualClock::new(T0));
    let limits = QuotaLimits { rpm: 10, rpd: 100 };

    limiter(&path, "alpha", limits, clock.clone()).acquire().await.unwrap();
    limiter(&path, "beta", limits, clock.clone()).acquire().await.unwrap();
    limiter(&path, "beta", limits, clock.clone()).acquire().await.unwrap();

    let file: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(file["alpha"]["minute_count"], 1);
    assert_eq!(file["beta"]["daily_count"], 2);
    assert_eq!(file["beta"]["day_start"], T0);
    assert!(file["alpha"].get("last_request").is_some());
    assert!(!path.with_extension("tmp").exists());
}

#[tokio::test]
async fn test_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate_limits.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let clock = Arc::new(ManualClock::new(T0));
    let rl = limiter(&path, "alpha", QuotaLimits { rpm: 5, rpd: 5 }, clock);
    assert_eq!(rl.status().await.state.day_count, 0);

    let slot = rl.acquire().await.unwrap();
    assert_eq!(slot.day_count, 1);
    let file: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(file["alpha"]["daily_count"], 1);
}

#[tokio::test]
async fn test_concurrent_acquires_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate_limits.json");
    let clock = Arc::new(ManualClock::new(T0));
    let rl = Arc::new(limiter(&path, "alpha", QuotaLimits { rpm: 2, rpd: 100 }, clock.clone()));

    let tasks = (0..3).map(|_| {
        let rl = rl.clone();
        tokio::spawn(async move { rl.acquire().await })
    });
    let slots: Vec<_> = futures_util::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let mut day_counts: Vec<u32> = slots.iter().map(|s| s.day_count).collect();
    day_counts.sort_unstable();
    assert_eq!(day_counts, vec![1, 2, 3]);
    assert_eq!(clock.sleep_count(), 1);
    assert!(clock.now() >= T0 + 60.0);
}

#[tokio::test]
async fn test_far_daily_reset_fails_fast_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate_limits.json");
    let clock = Arc::new(ManualClock::new(T0));
    let limits = QuotaLimits { rpm: 1, rpd: 1 };

    limiter(&path, "alpha", limits, clock.clone()).acquire().await.unwrap();
    clock.advance(Duration::from_secs(120));

    let err = limiter(&path, "alpha", limits, clock.clone()).acquire().await.unwrap_err();
    match err {
        QuotaError::DailyQuotaExceeded { resets_at, wait, .. } => {
            assert_eq!(resets_at, T0 + 86_400.0);
            assert_eq!(wait.as_secs(), 86_400 - 120);
        }
        other => panic!("expected daily quota error, got {:?}", other),
    }
    assert_eq!(clock.sleep_count(), 0);
}
