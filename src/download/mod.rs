//! Media download engine and its building blocks.
//!
//! This module turns a supported platform URL into a verified local file.
//!
//! # Features
//!
//! - Platform strategies backed by an external extraction tool
//! - Pinterest page scraping with a tool fallback
//! - Streaming downloads with size enforcement and fixed-delay retries
//! - Unique per-request output names and prefix-based output discovery
//! - Structured error types that map onto user-facing failure reasons
//!
//! # Example
//!
//! ```no_run
//! use mediabot_core::download::Fetcher;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::default();
//! let bytes = fetcher
//!     .fetch("https://i.pinimg.com/originals/aa/bb/cc.jpg", Path::new("temp/cc.jpg"))
//!     .await?;
//! println!("wrote {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod extractor;
mod fetch;
pub mod filename;
mod media;
mod retry;
mod strategy;

pub use client::{HttpClient, Page};
pub use engine::{DownloadSettings, MediaDownloader};
pub use error::{DownloadError, MediaError};
pub use extractor::{
    DEFAULT_EXTRACTOR_PROGRAM, ExtractorError, ExtractorRequest, MediaExtractor, YtDlpExtractor,
};
pub use fetch::Fetcher;
pub use media::{MediaDescriptor, MediaKind};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use strategy::pinterest::DEFAULT_PINTEREST_PAGE_BASE;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
