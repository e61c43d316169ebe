//! Failure taxonomy shared by the engine and the dispatcher, with the
//! user-facing text for each category.

use serde::Serialize;

/// Terminal failure category reported to the requester.
///
/// Internal error details never leave the process through this type; they are
/// logged where the failure is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The inbound text is not a URL with a scheme and a host.
    InvalidUrl,
    /// The URL is well formed but belongs to no supported platform.
    UnsupportedPlatform,
    /// The requester exceeded the sliding-window admission limit.
    RateLimited,
    /// Neither page scraping nor the external tool produced media.
    ExtractionFailed,
    /// The media is larger than the configured maximum.
    FileTooLarge,
    /// The remote side returned zero bytes.
    EmptyFile,
    /// Network or IO failure after all retries.
    DownloadFailed,
    /// Anything unanticipated caught at a task boundary.
    GenericFailure,
}

impl FailureReason {
    /// Stable machine label, used in logs and console output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::RateLimited => "rate_limited",
            Self::ExtractionFailed => "extraction_failed",
            Self::FileTooLarge => "file_too_large",
            Self::EmptyFile => "empty_file",
            Self::DownloadFailed => "download_failed",
            Self::GenericFailure => "generic_failure",
        }
    }

    /// Human-readable message shown to the requester.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidUrl => {
                "That does not look like a link. Send a full URL starting with https://"
            }
            Self::UnsupportedPlatform => {
                "This platform is not supported. Send an Instagram, TikTok or Pinterest link."
            }
            Self::RateLimited => "Too many requests. Please wait a minute and try again.",
            Self::ExtractionFailed => {
                "Could not find any media at that link. It may be private or removed."
            }
            Self::FileTooLarge => "The media file is too large to send.",
            Self::EmptyFile => "The platform returned an empty file. Please try again later.",
            Self::DownloadFailed => "Downloading the media failed. Please try again later.",
            Self::GenericFailure => "Something went wrong while processing your link.",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
