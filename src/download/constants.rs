//! Constants for the download module (timeouts, limits, retries).

use std::time::Duration;

/// Default per-attempt HTTP connect/read timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wall-clock limit for one external tool invocation (5 minutes).
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(300);

/// Default maximum accepted file size (50 MiB, the bot upload ceiling).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default attempts for the byte-streamed download, including the first.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed delay between streamed download attempts (2 seconds).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Longest stderr excerpt kept from a failed tool run.
pub const MAX_STDERR_EXCERPT: usize = 2000;
