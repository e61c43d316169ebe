//! Terminal outcomes and the status notices sent along the way.

use serde::Serialize;

use crate::download::MediaDescriptor;
use crate::failure::FailureReason;

/// Final result of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The text was not a URL.
    InvalidUrl,
    /// The URL belongs to no supported platform.
    UnsupportedPlatform,
    /// The requester is over the admission limit.
    RateLimited,
    /// Media was downloaded and delivered.
    Success {
        /// Descriptor of the delivered file. The file itself is gone by the
        /// time this is observed.
        media: MediaDescriptor,
    },
    /// Work was scheduled but ended in a failure.
    Failure {
        /// Category shown to the requester.
        reason: FailureReason,
    },
}

impl Outcome {
    /// Builds the outcome for a failure category, using the dedicated
    /// variants for admission rejections.
    #[must_use]
    pub fn from_reason(reason: FailureReason) -> Self {
        match reason {
            FailureReason::InvalidUrl => Self::InvalidUrl,
            FailureReason::UnsupportedPlatform => Self::UnsupportedPlatform,
            FailureReason::RateLimited => Self::RateLimited,
            reason => Self::Failure { reason },
        }
    }

    /// The failure category, or `None` on success.
    #[must_use]
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::InvalidUrl => Some(FailureReason::InvalidUrl),
            Self::UnsupportedPlatform => Some(FailureReason::UnsupportedPlatform),
            Self::RateLimited => Some(FailureReason::RateLimited),
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(*reason),
        }
    }

    /// Returns true when media was delivered.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Progress message for the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", content = "reason", rename_all = "snake_case")]
pub enum Notice {
    /// The link was accepted and queued for work.
    Processing,
    /// The download has started.
    Downloading,
    /// The media is on its way.
    Success,
    /// The request ended in a failure.
    Failed(FailureReason),
}

impl Notice {
    /// Text shown to the requester.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Processing => "Processing your link...",
            Self::Downloading => "Downloading media...",
            Self::Success => "Done! Sending the file.",
            Self::Failed(reason) => reason.user_message(),
        }
    }
}
