//! Retry classification for byte-streamed downloads.
//!
//! A failed attempt is classified into a [`FailureType`]; the [`RetryPolicy`]
//! then decides whether another attempt is worth making. Delays are fixed:
//! every retry waits the same configured duration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mediabot_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(2));
//! let error = DownloadError::http_status("https://cdn.example/v.mp4", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(2));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Whether a failure may go away on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Network trouble, timeouts, 5xx, 408 and 429.
    Transient,

    /// Everything else: other 4xx, size violations, empty bodies, local IO.
    Permanent,
}

/// Decision on whether to retry a failed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the download after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the download.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Attempt budget and the pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial one.
    max_attempts: u32,

    /// Pause before each retry.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause before each retry.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides what to do after attempt number `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = self.delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout, Network | Transient |
/// | HTTP 408, 429, 5xx | Transient |
/// | Other HTTP statuses | Permanent |
/// | FileTooLarge, EmptyFile | Permanent |
/// | Io, InvalidUrl | Permanent |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Timeout { .. } | DownloadError::Network { .. } => FailureType::Transient,
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),
        DownloadError::RetriesExhausted { last, .. } => classify_error(last),
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::FileTooLarge { .. }
        | DownloadError::EmptyFile { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 | 429 | 500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}
