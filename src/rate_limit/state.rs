//! Rolling minute/day counters for one backend.
//!
//! All arithmetic here is pure: callers pass `now` in epoch seconds. The
//! serialized field names are the on-disk format of the quota file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Length of the per-minute window in seconds.
pub const MINUTE_WINDOW_SECS: f64 = 60.0;
/// Length of the per-day window in seconds.
pub const DAY_WINDOW_SECS: f64 = 86_400.0;

/// Configured throughput caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaLimits {
    pub rpm: u32,
    pub rpd: u32,
}

/// Durable per-backend counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaState {
    #[serde(rename = "last_request", default)]
    pub last_request_time: f64,
    #[serde(default)]
    pub minute_count: u32,
    #[serde(rename = "minute_start", default)]
    pub minute_window_start: f64,
    #[serde(rename = "daily_count", default)]
    pub day_count: u32,
    #[serde(rename = "day_start", default)]
    pub day_window_start: f64,
}

/// A granted acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaSlot {
    pub granted_at: f64,
    pub minute_count: u32,
    pub day_count: u32,
}

/// Outcome of one acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquireDecision {
    /// Counters incremented; the caller may dispatch.
    Granted(QuotaSlot),
    /// A window is full; retry after the duration.
    WaitRequired(Duration),
    /// The daily window is full and resets too far away to wait for.
    QuotaExceededFatal { resets_at: f64, wait: Duration },
}

impl QuotaState {
    /// Reset any window whose length has fully elapsed.
    pub fn refresh(&mut self, now: f64) {
        if now - self.minute_window_start >= MINUTE_WINDOW_SECS {
            self.minute_count = 0;
            self.minute_window_start = now;
        }
        if now - self.day_window_start >= DAY_WINDOW_SECS {
            self.day_count = 0;
            self.day_window_start = now;
        }
    }

    /// Epoch seconds at which the daily window resets.
    pub fn day_resets_at(&self) -> f64 {
        self.day_window_start + DAY_WINDOW_SECS
    }

    /// Refresh windows and, if both have room, take a slot.
    ///
    /// Daily waits longer than `max_day_wait` are reported as fatal rather
    /// than as a wait.
    pub fn try_acquire(&mut self, limits: QuotaLimits, now: f64, max_day_wait: Duration) -> AcquireDecision {
        self.refresh(now);

        if self.day_count >= limits.rpd {
            let resets_at = self.day_resets_at();
            let wait = secs_to_duration(resets_at - now);
            if wait > max_day_wait {
                return AcquireDecision::QuotaExceededFatal { resets_at, wait };
            }
            return AcquireDecision::WaitRequired(wait);
        }

        if self.minute_count >= limits.rpm {
            let wait = secs_to_duration(self.minute_window_start + MINUTE_WINDOW_SECS - now)
                .min(Duration::from_secs_f64(MINUTE_WINDOW_SECS));
            return AcquireDecision::WaitRequired(wait);
        }

        self.minute_count += 1;
        self.day_count += 1;
        self.last_request_time = now;
        AcquireDecision::Granted(QuotaSlot {
            granted_at: now,
            minute_count: self.minute_count,
            day_count: self.day_count,
        })
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}
