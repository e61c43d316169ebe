//! Per-user sliding-window admission control.
//!
//! Each user owns a window of recent admission timestamps. On every check the
//! window drops timestamps older than the period, then either records the new
//! request or rejects it when the window is already full.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mediabot_core::limiter::RateLimiter;
//!
//! let limiter = RateLimiter::new(2, Duration::from_secs(60));
//! assert!(limiter.admit(42));
//! assert!(limiter.admit(42));
//! assert!(!limiter.admit(42));
//! // Other users have their own window.
//! assert!(limiter.admit(7));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::request::UserId;

/// Default number of admissions per window.
pub const DEFAULT_RATE_LIMIT: usize = 5;

/// Default window length (60 seconds).
pub const DEFAULT_RATE_PERIOD: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter keyed by user.
///
/// Designed to be wrapped in `Arc` and shared across tasks. The `DashMap`
/// only guards window lookup; each window has its own mutex, so checks for
/// different users never contend and checks for the same user are
/// serialized through prune, compare and append.
#[derive(Debug)]
pub struct RateLimiter {
    /// Admissions allowed per window.
    limit: usize,

    /// Window length.
    period: Duration,

    /// Whether admission checks are skipped entirely.
    disabled: bool,

    /// Per-user windows. The `Arc` lets a window be locked after the map
    /// shard lock is released.
    windows: DashMap<UserId, Arc<Mutex<RateWindow>>>,
}

/// Admission timestamps of one user, oldest first.
#[derive(Debug, Default)]
pub struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    /// Drops timestamps at least `period` old relative to `now`.
    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= period {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of timestamps currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns true when no timestamps are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT, DEFAULT_RATE_PERIOD)
    }
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `period` per user.
    #[must_use]
    #[instrument(skip_all, fields(limit = limit, period_secs = period.as_secs()))]
    pub fn new(limit: usize, period: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            limit,
            period,
            disabled: false,
            windows: DashMap::new(),
        }
    }

    /// Creates a limiter that admits everything.
    #[must_use]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            limit: usize::MAX,
            period: Duration::ZERO,
            disabled: true,
            windows: DashMap::new(),
        }
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Configured admissions per window.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Configured window length.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Checks and records an admission for `user_id` using the configured limits.
    #[must_use]
    pub fn admit(&self, user_id: UserId) -> bool {
        self.admit_at(user_id, self.limit, self.period, Instant::now())
    }

    /// Checks and records an admission with explicit limits.
    #[must_use]
    pub fn admit_with(&self, user_id: UserId, limit: usize, period: Duration) -> bool {
        self.admit_at(user_id, limit, period, Instant::now())
    }

    /// Checks and records an admission as of `now`.
    ///
    /// Rejected requests are not recorded, so a user hammering the limiter
    /// does not extend their own lockout.
    #[must_use]
    pub fn admit_at(&self, user_id: UserId, limit: usize, period: Duration, now: Instant) -> bool {
        if self.disabled {
            return true;
        }

        let window = Arc::clone(self.windows.entry(user_id).or_default().value());
        let mut guard = window.lock().unwrap_or_else(PoisonError::into_inner);

        guard.prune(now, period);
        if guard.len() >= limit {
            debug!(user_id, limit, in_window = guard.len(), "rate limit exceeded");
            return false;
        }

        guard.timestamps.push_back(now);
        true
    }

    /// Number of admissions currently recorded for `user_id`, without pruning.
    #[must_use]
    pub fn recorded(&self, user_id: UserId) -> usize {
        self.windows.get(&user_id).map_or(0, |window| {
            window
                .value()
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        })
    }
}
