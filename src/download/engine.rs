//! The media download engine.
//!
//! [`MediaDownloader`] turns a URL into a verified file in a scratch
//! directory. It classifies the URL, derives the media id, then hands off to
//! the platform's strategy:
//!
//! | Platform | Strategy |
//! |----------|----------|
//! | Instagram | one extraction-tool run |
//! | TikTok | tool run with browser headers, then one simplified retry |
//! | Pinterest | page scrape and streamed download, then one tool run |
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use mediabot_core::download::{DownloadSettings, HttpClient, MediaDownloader, YtDlpExtractor};
//! use mediabot_core::platform::PlatformRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = MediaDownloader::new(
//!     PlatformRegistry::default(),
//!     HttpClient::new(),
//!     Arc::new(YtDlpExtractor::default()),
//!     DownloadSettings::default(),
//! );
//! let media = downloader
//!     .download("https://www.instagram.com/p/ABC123/", Path::new("temp/42"))
//!     .await?;
//! println!("{} ({})", media.path.display(), media.kind);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use super::client::HttpClient;
use super::constants::DEFAULT_MAX_FILE_SIZE;
use super::error::MediaError;
use super::extractor::MediaExtractor;
use super::fetch::Fetcher;
use super::media::MediaDescriptor;
use super::retry::RetryPolicy;
use super::strategy::pinterest::{DEFAULT_PINTEREST_PAGE_BASE, Scraper, is_short_link};
use super::strategy::{Job, instagram, pinterest, tiktok};
use crate::platform::{
    PINTEREST_SHORT_HOST, Platform, PlatformRegistry, media_id_from_url, parse_http_url, short_code,
};

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Largest file accepted, in bytes.
    pub max_file_size: u64,
    /// Retry policy for streamed downloads.
    pub retry_policy: RetryPolicy,
    /// Origin used to build canonical pin page URLs.
    pub pinterest_page_base: String,
    /// Hosts whose links are Pinterest short links, resolved by redirect.
    pub pinterest_short_hosts: Vec<String>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            retry_policy: RetryPolicy::default(),
            pinterest_page_base: DEFAULT_PINTEREST_PAGE_BASE.to_string(),
            pinterest_short_hosts: vec![PINTEREST_SHORT_HOST.to_string()],
        }
    }
}

/// Downloads media for supported platform URLs.
///
/// Cheap to share behind an `Arc`; every call is independent and keeps its
/// files under the scratch directory it was given.
pub struct MediaDownloader {
    registry: PlatformRegistry,
    http: HttpClient,
    fetcher: Fetcher,
    extractor: Arc<dyn MediaExtractor>,
    settings: DownloadSettings,
}

impl fmt::Debug for MediaDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDownloader")
            .field("registry", &self.registry)
            .field("extractor", &self.extractor.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MediaDownloader {
    /// Creates an engine. `http` is shared by page fetches and streamed
    /// downloads.
    #[must_use]
    pub fn new(
        registry: PlatformRegistry,
        http: HttpClient,
        extractor: Arc<dyn MediaExtractor>,
        settings: DownloadSettings,
    ) -> Self {
        let fetcher = Fetcher::new(
            http.clone(),
            settings.retry_policy.clone(),
            settings.max_file_size,
        );
        debug!(
            extractor = extractor.name(),
            max_file_size = settings.max_file_size,
            max_attempts = settings.retry_policy.max_attempts(),
            "creating media downloader"
        );
        Self {
            registry,
            http,
            fetcher,
            extractor,
            settings,
        }
    }

    /// The platform registry used for classification.
    #[must_use]
    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    /// The configured settings.
    #[must_use]
    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    /// Downloads the media behind `raw_url` into `scratch_dir`.
    ///
    /// On success exactly one new file exists under `scratch_dir` and the
    /// returned descriptor points at it. On failure no file of this call is
    /// left behind, apart from whatever the external tool may leave outside
    /// its output template.
    ///
    /// # Errors
    ///
    /// - [`MediaError::UnsupportedPlatform`] for invalid or unknown URLs
    /// - [`MediaError::MissingMediaId`] when the URL has no recognizable id
    /// - [`MediaError::ExtractionFailed`] / [`MediaError::AmbiguousOutput`]
    ///   when every strategy failed
    /// - size, emptiness and download errors from validation
    #[instrument(skip(self, scratch_dir), fields(url = %raw_url, scratch = %scratch_dir.display()))]
    pub async fn download(
        &self,
        raw_url: &str,
        scratch_dir: &Path,
    ) -> Result<MediaDescriptor, MediaError> {
        let raw_url = raw_url.trim();
        let unsupported = || MediaError::UnsupportedPlatform {
            url: raw_url.to_string(),
        };
        let url = parse_http_url(raw_url).ok_or_else(unsupported)?;
        let platform = self.registry.classify_url(&url).ok_or_else(unsupported)?;
        let short_link = platform == Platform::Pinterest
            && is_short_link(raw_url, &self.settings.pinterest_short_hosts);
        let media_id = if short_link {
            short_code(&url)
        } else {
            media_id_from_url(&url, platform)
        }
        .ok_or_else(|| MediaError::MissingMediaId {
            url: raw_url.to_string(),
            platform,
        })?;
        debug!(%platform, %media_id, "dispatching to platform strategy");

        let job = Job::new(
            platform,
            raw_url,
            media_id,
            scratch_dir,
            self.settings.max_file_size,
        );
        let extractor = self.extractor.as_ref();
        match platform {
            Platform::Instagram => instagram::download(&job, extractor).await,
            Platform::TikTok => tiktok::download(&job, extractor).await,
            Platform::Pinterest => {
                let scraper = Scraper {
                    http: &self.http,
                    fetcher: &self.fetcher,
                    page_base: &self.settings.pinterest_page_base,
                    short_hosts: &self.settings.pinterest_short_hosts,
                };
                pinterest::download(job, &scraper, extractor).await
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::download::extractor::{ExtractorError, ExtractorRequest};
    use crate::download::media::MediaKind;

    /// Plays back scripted results; `Some(ext)` writes a file, `None` fails.
    struct ScriptedExtractor {
        script: Mutex<Vec<Option<&'static str>>>,
        seen: Mutex<Vec<ExtractorRequest>>,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<Option<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MediaExtractor for ScriptedExtractor {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn extract(&self, request: &ExtractorRequest) -> Result<(), ExtractorError> {
            self.seen.lock().unwrap().push(request.clone());
            let step = self.script.lock().unwrap().remove(0);
            match step {
                Some(ext) => {
                    let path = request.output_template.replace("%(ext)s", ext);
                    std::fs::write(path, b"media bytes").unwrap();
                    Ok(())
                }
                None => Err(ExtractorError::Failed {
                    code: Some(1),
                    stderr: "ERROR: unavailable".to_string(),
                }),
            }
        }
    }

    fn engine(extractor: Arc<ScriptedExtractor>) -> MediaDownloader {
        MediaDownloader::new(
            PlatformRegistry::default(),
            HttpClient::new(),
            extractor,
            DownloadSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_instagram_success_classifies_video() {
        let scratch = TempDir::new().unwrap();
        let extractor = ScriptedExtractor::new(vec![Some("mp4")]);
        let media = engine(Arc::clone(&extractor))
            .download("https://www.instagram.com/p/ABC123/", scratch.path())
            .await
            .unwrap();

        assert_eq!(media.platform, Platform::Instagram);
        assert_eq!(media.media_id, "ABC123");
        assert_eq!(media.kind, MediaKind::Video);
        assert!(media.file_name.starts_with("instagram_ABC123_"));
        assert!(media.path.exists());
        let seen = extractor.seen.lock().unwrap();
        assert!(seen[0].quiet && seen[0].no_warnings);
    }

    #[tokio::test]
    async fn test_tiktok_falls_back_once() {
        let scratch = TempDir::new().unwrap();
        let extractor = ScriptedExtractor::new(vec![None, Some("gif")]);
        let media = engine(Arc::clone(&extractor))
            .download("https://vm.tiktok.com/ZMabc/", scratch.path())
            .await
            .unwrap();

        assert_eq!(media.kind, MediaKind::Animation);
        let seen = extractor.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].user_agent.is_some());
        assert_eq!(seen[1].format.as_deref(), Some("best"));
        assert!(seen[1].no_check_certificate);
    }

    #[tokio::test]
    async fn test_tiktok_both_attempts_fail() {
        let scratch = TempDir::new().unwrap();
        let extractor = ScriptedExtractor::new(vec![None, None]);
        let result = engine(extractor)
            .download("https://www.tiktok.com/@u/video/123", scratch.path())
            .await;
        assert!(matches!(result, Err(MediaError::ExtractionFailed { .. })));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_and_missing_id_short_circuit() {
        let scratch = TempDir::new().unwrap();
        let extractor = ScriptedExtractor::new(vec![]);
        let engine = engine(Arc::clone(&extractor));

        let result = engine.download("https://example.com/foo", scratch.path()).await;
        assert!(matches!(result, Err(MediaError::UnsupportedPlatform { .. })));

        let result = engine.download("not a url", scratch.path()).await;
        assert!(matches!(result, Err(MediaError::UnsupportedPlatform { .. })));

        let result = engine
            .download("https://www.instagram.com/someone/", scratch.path())
            .await;
        assert!(matches!(result, Err(MediaError::MissingMediaId { .. })));

        assert!(extractor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_output_over_limit_is_rejected() {
        let scratch = TempDir::new().unwrap();
        let extractor = ScriptedExtractor::new(vec![Some("mp4")]);
        let engine = MediaDownloader::new(
            PlatformRegistry::default(),
            HttpClient::new(),
            extractor,
            DownloadSettings {
                max_file_size: 4,
                ..DownloadSettings::default()
            },
        );
        let result = engine
            .download("https://www.instagram.com/reel/R1/", scratch.path())
            .await;
        assert!(matches!(result, Err(MediaError::FileTooLarge { .. })));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
