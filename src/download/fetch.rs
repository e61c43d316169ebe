//! Retrying byte-streamed downloads.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::constants::DEFAULT_MAX_FILE_SIZE;
use super::error::DownloadError;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

/// Streams one remote file to disk, retrying transient failures.
///
/// Each attempt truncates `dest`; a failed attempt never leaves a partial file
/// behind, and neither does the final failure.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: HttpClient,
    policy: RetryPolicy,
    max_file_size: u64,
}

impl Fetcher {
    /// Creates a fetcher sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: HttpClient, policy: RetryPolicy, max_file_size: u64) -> Self {
        Self {
            client,
            policy,
            max_file_size,
        }
    }

    /// The size ceiling applied to every attempt.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// The retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Downloads `url` into `dest`.
    ///
    /// # Returns
    ///
    /// Bytes written on success.
    ///
    /// # Errors
    ///
    /// Permanent failures (oversize, empty body, non-retryable status) are
    /// returned as-is after the first attempt. Transient failures that outlast
    /// the attempt budget come back as [`DownloadError::RetriesExhausted`].
    #[instrument(skip(self, dest), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting download");

            let error = match self
                .client
                .download_once(url, dest, self.max_file_size)
                .await
            {
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };

            match self.policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying download");
                    // download_once cleans up after itself; this covers a
                    // file left by an earlier attempt.
                    let _ = tokio::fs::remove_file(dest).await;
                    if attempt > 1 && classify_error(&error) == FailureType::Transient {
                        warn!(attempts = attempt, error = %error, "download retries exhausted");
                        return Err(DownloadError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last: Box::new(error),
                        });
                    }
                    return Err(error);
                }
            }
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(
            HttpClient::new(),
            RetryPolicy::default(),
            DEFAULT_MAX_FILE_SIZE,
        )
    }
}
