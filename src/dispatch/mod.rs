//! Request dispatch: admission, per-request tasks and delivery.
//!
//! Admission (URL check, platform classification, rate limit) runs inline
//! and cheaply. Admitted requests run as independent tokio tasks through
//! download, delivery and cleanup. A panic inside one task is caught at the
//! task boundary and reported as a generic failure; it never reaches other
//! requests or the process.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediabot_core::dispatch::{Dispatcher, DirectorySink};
//! use mediabot_core::download::{DownloadSettings, HttpClient, MediaDownloader, YtDlpExtractor};
//! use mediabot_core::limiter::RateLimiter;
//! use mediabot_core::platform::PlatformRegistry;
//! use mediabot_core::storage::StorageManager;
//!
//! # async fn example() {
//! let downloader = MediaDownloader::new(
//!     PlatformRegistry::default(),
//!     HttpClient::new(),
//!     Arc::new(YtDlpExtractor::default()),
//!     DownloadSettings::default(),
//! );
//! let dispatcher = Dispatcher::new(
//!     Arc::new(RateLimiter::default()),
//!     StorageManager::new("temp"),
//!     Arc::new(downloader),
//!     Arc::new(DirectorySink::new("delivered")),
//! );
//! let outcome = dispatcher.submit(42, "https://www.instagram.com/p/ABC123/").await.outcome().await;
//! println!("{outcome:?}");
//! # }
//! ```

mod lease;
mod outcome;
mod sink;

pub use lease::MediaLease;
pub use outcome::{Notice, Outcome};
pub use sink::{Delivery, DeliveryError, DeliverySink, DirectorySink, Transport};

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::download::MediaDownloader;
use crate::failure::FailureReason;
use crate::limiter::RateLimiter;
use crate::platform::{Platform, is_valid_url};
use crate::request::{Request, UserId};
use crate::storage::StorageManager;

/// Caption prefix attached to delivered media.
pub const DEFAULT_CAPTION: &str = "Downloaded with mediabot";

/// Result of [`Dispatcher::submit`].
#[derive(Debug)]
pub enum Submission {
    /// Rejected at admission; no task was started.
    Rejected(Outcome),
    /// Admitted; the task resolves to the terminal outcome.
    Spawned(JoinHandle<Outcome>),
}

impl Submission {
    /// Waits for the terminal outcome.
    pub async fn outcome(self) -> Outcome {
        match self {
            Self::Rejected(outcome) => outcome,
            Self::Spawned(handle) => handle.await.unwrap_or_else(|e| {
                error!(error = %e, "request task did not complete");
                Outcome::Failure {
                    reason: FailureReason::GenericFailure,
                }
            }),
        }
    }
}

/// Routes inbound requests through admission, download and delivery.
///
/// Cloning is cheap; clones share the limiter, engine, sink and any
/// concurrency bound.
#[derive(Clone)]
pub struct Dispatcher {
    limiter: Arc<RateLimiter>,
    storage: StorageManager,
    downloader: Arc<MediaDownloader>,
    sink: Arc<dyn DeliverySink>,
    caption: String,
    permits: Option<Arc<Semaphore>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("limiter", &self.limiter)
            .field("storage", &self.storage)
            .field("downloader", &self.downloader)
            .field("caption", &self.caption)
            .field(
                "max_concurrent",
                &self.permits.as_ref().map(|p| p.available_permits()),
            )
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with unbounded per-request concurrency.
    #[must_use]
    pub fn new(
        limiter: Arc<RateLimiter>,
        storage: StorageManager,
        downloader: Arc<MediaDownloader>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            limiter,
            storage,
            downloader,
            sink,
            caption: DEFAULT_CAPTION.to_string(),
            permits: None,
        }
    }

    /// Caps how many admitted requests download at once. Requests over the
    /// cap wait for a permit inside their task; admission is unaffected.
    #[must_use]
    pub fn with_concurrency_limit(mut self, max: usize) -> Self {
        self.permits = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    /// Replaces the caption prefix.
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Runs the admission checks for `request`.
    ///
    /// The URL check and classification come first, so malformed or
    /// unsupported links never consume rate-limit budget.
    ///
    /// # Errors
    ///
    /// Returns the rejection outcome when the request is not admitted.
    pub fn admit(&self, request: &Request) -> Result<Platform, Outcome> {
        if !is_valid_url(&request.url) {
            debug!(user_id = request.user_id, text = %request.url, "rejected: invalid url");
            return Err(Outcome::InvalidUrl);
        }
        let Some(platform) = self.downloader.registry().classify(&request.url) else {
            debug!(user_id = request.user_id, url = %request.url, "rejected: unsupported platform");
            return Err(Outcome::UnsupportedPlatform);
        };
        if !self.limiter.admit(request.user_id) {
            warn!(user_id = request.user_id, "rejected: rate limited");
            return Err(Outcome::RateLimited);
        }
        Ok(platform)
    }

    /// Admits `text` from `user_id` and, if admitted, spawns its task.
    pub async fn submit(&self, user_id: UserId, text: &str) -> Submission {
        let request = Request::new(user_id, text);
        let platform = match self.admit(&request) {
            Ok(platform) => platform,
            Err(outcome) => {
                self.notify_rejection(user_id, &outcome).await;
                return Submission::Rejected(outcome);
            }
        };
        self.sink.notify(user_id, Notice::Processing).await;
        info!(user_id, url = %request.url, %platform, "request admitted");

        let dispatcher = self.clone();
        let span = info_span!("request", user_id, %platform);
        Submission::Spawned(tokio::spawn(
            async move { dispatcher.run_guarded(request).await }.instrument(span),
        ))
    }

    /// Admits and processes `text` inline, returning the terminal outcome.
    pub async fn handle(&self, user_id: UserId, text: &str) -> Outcome {
        let request = Request::new(user_id, text);
        if let Err(outcome) = self.admit(&request) {
            self.notify_rejection(user_id, &outcome).await;
            return outcome;
        }
        self.sink.notify(user_id, Notice::Processing).await;
        self.run_guarded(request).await
    }

    async fn notify_rejection(&self, user_id: UserId, outcome: &Outcome) {
        if let Some(reason) = outcome.reason() {
            self.sink.notify(user_id, Notice::Failed(reason)).await;
        }
    }

    /// Task boundary: converts a panic into a generic failure.
    async fn run_guarded(&self, request: Request) -> Outcome {
        let user_id = request.user_id;
        match AssertUnwindSafe(self.process(request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    user_id,
                    panic = %panic_message(payload.as_ref()),
                    "request task panicked"
                );
                let reason = FailureReason::GenericFailure;
                self.sink.notify(user_id, Notice::Failed(reason)).await;
                Outcome::Failure { reason }
            }
        }
    }

    async fn process(&self, request: Request) -> Outcome {
        let user_id = request.user_id;
        let _permit = match &self.permits {
            Some(permits) => match Arc::clone(permits).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return self.fail(user_id, FailureReason::GenericFailure).await,
            },
            None => None,
        };

        self.sink.notify(user_id, Notice::Downloading).await;

        let scratch = match self.storage.user_dir(user_id).await {
            Ok(dir) => dir,
            Err(e) => {
                error!(user_id, error = %e, "cannot prepare scratch directory");
                return self.fail(user_id, FailureReason::GenericFailure).await;
            }
        };

        let media = match self.downloader.download(&request.url, &scratch).await {
            Ok(media) => media,
            Err(e) => {
                warn!(user_id, url = %request.url, error = %e, "download failed");
                return self.fail(user_id, e.reason()).await;
            }
        };

        let lease = MediaLease::new(media.path.clone());
        if !lease.is_present().await {
            // Removed between download and delivery, e.g. by a purge.
            warn!(user_id, path = %media.path.display(), "media vanished before delivery");
            return self.fail(user_id, FailureReason::DownloadFailed).await;
        }

        self.sink.notify(user_id, Notice::Success).await;
        let delivery = Delivery {
            media: &media,
            transport: Transport::for_kind(media.kind),
            caption: format!("{} | {}", self.caption, media.platform.display_name()),
        };
        let result = self.sink.deliver(user_id, &delivery).await;
        lease.release().await;

        match result {
            Ok(()) => {
                info!(user_id, file = %media.file_name, kind = %media.kind, size = media.size, "request complete");
                Outcome::Success { media }
            }
            Err(DeliveryError::TooLarge { size }) => {
                warn!(user_id, size, "channel rejected file as too large");
                self.fail(user_id, FailureReason::FileTooLarge).await
            }
            Err(e) => {
                error!(user_id, error = %e, "delivery failed");
                self.fail(user_id, FailureReason::GenericFailure).await
            }
        }
    }

    async fn fail(&self, user_id: UserId, reason: FailureReason) -> Outcome {
        self.sink.notify(user_id, Notice::Failed(reason)).await;
        Outcome::from_reason(reason)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
