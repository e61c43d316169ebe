//! Mediabot Core Library
//!
//! Fetches media from Instagram, TikTok and Pinterest on behalf of chat
//! users and hands the files to an outbound channel.
//!
//! # Architecture
//!
//! - [`platform`] - URL classification and media-id extraction
//! - [`limiter`] - per-user sliding-window admission limits
//! - [`storage`] - scratch directories and the periodic purge
//! - [`download`] - the media engine: HTTP client, retries, extraction tool, platform strategies
//! - [`dispatch`] - admission, per-request tasks, delivery and cleanup
//! - [`config`] - defaults, config file and environment overrides

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod download;
pub mod failure;
pub mod limiter;
pub mod platform;
pub mod request;
pub mod storage;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use dispatch::{DeliverySink, DirectorySink, Dispatcher, Notice, Outcome, Submission};
pub use download::{
    DownloadError, HttpClient, MediaDescriptor, MediaDownloader, MediaError, MediaExtractor,
    MediaKind, YtDlpExtractor,
};
pub use failure::FailureReason;
pub use limiter::RateLimiter;
pub use platform::{Platform, PlatformRegistry};
pub use request::{Request, UserId};
pub use storage::StorageManager;
