//! Error types for the download module.
//!
//! [`DownloadError`] covers the byte-streamed primitive (one URL, one
//! destination file). [`MediaError`] covers a whole platform download and maps
//! onto the user-facing [`FailureReason`] taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use crate::failure::FailureReason;
use crate::platform::Platform;

/// Errors from streaming one remote file to disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Declared or streamed size exceeds the configured maximum.
    #[error("file at {url} is too large: {bytes} bytes exceeds limit of {limit}")]
    FileTooLarge {
        /// The URL being downloaded.
        url: String,
        /// Declared length, or bytes received when the limit was crossed.
        bytes: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// The server answered successfully with an empty body.
    #[error("empty response body from {url}")]
    EmptyFile {
        /// The URL being downloaded.
        url: String,
    },

    /// Transient failures persisted through every allowed attempt.
    #[error("download of {url} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The URL being downloaded.
        url: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<DownloadError>,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a size-limit error.
    pub fn too_large(url: impl Into<String>, bytes: u64, limit: u64) -> Self {
        Self::FileTooLarge {
            url: url.into(),
            bytes,
            limit,
        }
    }

    /// Creates an empty-body error.
    pub fn empty(url: impl Into<String>) -> Self {
        Self::EmptyFile { url: url.into() }
    }

    /// User-facing category for this error.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::FileTooLarge { .. } => FailureReason::FileTooLarge,
            Self::EmptyFile { .. } => FailureReason::EmptyFile,
            _ => FailureReason::DownloadFailed,
        }
    }
}

/// Errors from a complete platform download.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The URL is not valid or its host belongs to no supported platform.
    #[error("unsupported platform for {url}")]
    UnsupportedPlatform {
        /// The rejected URL.
        url: String,
    },

    /// No media identifier could be derived from the URL.
    #[error("no {platform} media id in {url}")]
    MissingMediaId {
        /// The URL that was inspected.
        url: String,
        /// The platform whose rules were applied.
        platform: Platform,
    },

    /// Every extraction strategy for the platform failed.
    #[error("{platform} extraction failed for {url}: {detail}")]
    ExtractionFailed {
        /// The platform being extracted.
        platform: Platform,
        /// The requested URL.
        url: String,
        /// Last failure detail, for logs only.
        detail: String,
    },

    /// The external tool left more than one file with the request prefix.
    #[error("ambiguous tool output: {count} files match prefix {prefix}")]
    AmbiguousOutput {
        /// The unique per-request filename prefix.
        prefix: String,
        /// Number of matching files found.
        count: usize,
    },

    /// The produced file exceeds the configured maximum.
    #[error("{path} is too large: {bytes} bytes exceeds limit of {limit}")]
    FileTooLarge {
        /// The rejected file (already removed).
        path: PathBuf,
        /// Its size.
        bytes: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// The produced file is empty.
    #[error("{path} is empty")]
    EmptyFile {
        /// The rejected file (already removed).
        path: PathBuf,
    },

    /// The byte-streamed download failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Scratch directory IO failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl MediaError {
    /// Creates an extraction failure with a diagnostic detail.
    pub fn extraction_failed(
        platform: Platform,
        url: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::ExtractionFailed {
            platform,
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// User-facing category for this error.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::UnsupportedPlatform { .. } => FailureReason::UnsupportedPlatform,
            Self::MissingMediaId { .. }
            | Self::ExtractionFailed { .. }
            | Self::AmbiguousOutput { .. } => FailureReason::ExtractionFailed,
            Self::FileTooLarge { .. } => FailureReason::FileTooLarge,
            Self::EmptyFile { .. } => FailureReason::EmptyFile,
            Self::Download(error) => error.reason(),
            Self::Io { .. } => FailureReason::DownloadFailed,
        }
    }
}

// DownloadError deliberately has no `From<reqwest::Error>` or
// `From<std::io::Error>`: every variant needs the URL or path, which the
// source errors do not carry.
