//! Pinterest: scrape the pin page for a media URL, else run the tool.
//!
//! Pin pages embed the media location in JSON blobs and Open Graph tags.
//! Video patterns are tried before image patterns; within each group the
//! first match wins. Any failure in the scrape phase (page fetch, no match,
//! streamed download) falls through to one extraction-tool run on the
//! original URL.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{Job, remove_outputs, run_tool};
use crate::download::client::HttpClient;
use crate::download::error::MediaError;
use crate::download::extractor::{ExtractorRequest, MediaExtractor};
use crate::download::fetch::Fetcher;
use crate::download::media::{MediaDescriptor, MediaKind};
use crate::platform::{Platform, media_id_from_url};

/// Default origin for canonical pin pages.
pub const DEFAULT_PINTEREST_PAGE_BASE: &str = "https://www.pinterest.com";

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static VIDEO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""video_url":"([^"]+)""#,
        r#""videos":\{[^}]*"video_list":\{[^}]*"url":"([^"]+)""#,
        r#"<meta property="og:video" content="([^"]+)""#,
        r#"<meta property="og:video:url" content="([^"]+)""#,
    ]
    .into_iter()
    .map(compile_static_regex)
    .collect()
});

static IMAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""image_url":"([^"]+)""#,
        r#""images":\{[^}]*"orig":\{"url":"([^"]+)""#,
        r#"<meta property="og:image" content="([^"]+)""#,
        r#"<img[^>]*src="([^"]+)"[^>]*class="[^"]*mainImage[^"]*""#,
        r#"data-test-id="pin-image"[^>]*src="([^"]+)""#,
    ]
    .into_iter()
    .map(compile_static_regex)
    .collect()
});

/// A media URL found in a pin page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FoundMedia {
    pub url: String,
    pub kind: MediaKind,
}

impl FoundMedia {
    fn extension(&self) -> &'static str {
        match self.kind {
            MediaKind::Video => "mp4",
            _ => "jpg",
        }
    }
}

/// Searches `html` for a media URL, resolving it against `page_url`.
pub(crate) fn find_media(html: &str, page_url: &Url) -> Option<FoundMedia> {
    let groups = [
        (&*VIDEO_PATTERNS, MediaKind::Video),
        (&*IMAGE_PATTERNS, MediaKind::Image),
    ];
    groups.into_iter().find_map(|(patterns, kind)| {
        patterns.iter().find_map(|pattern| {
            let raw = pattern.captures(html)?.get(1)?.as_str();
            let url = absolutize_url(&unescape_embedded_url(raw), page_url)?;
            Some(FoundMedia { url, kind })
        })
    })
}

/// Undoes JSON and HTML escaping seen in embedded media URLs.
pub(crate) fn unescape_embedded_url(raw: &str) -> String {
    raw.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("&amp;", "&")
}

fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(String::from)
}

/// Dependencies of the scrape phase.
pub(crate) struct Scraper<'a> {
    pub http: &'a HttpClient,
    pub fetcher: &'a Fetcher,
    pub page_base: &'a str,
    pub short_hosts: &'a [String],
}

#[instrument(skip_all, fields(url = %job.url, media_id = %job.media_id))]
pub(crate) async fn download(
    mut job: Job<'_>,
    scraper: &Scraper<'_>,
    extractor: &dyn MediaExtractor,
) -> Result<MediaDescriptor, MediaError> {
    match scrape(&mut job, scraper).await {
        Ok(descriptor) => {
            info!(file = %descriptor.file_name, kind = %descriptor.kind, "pinterest media ready");
            return Ok(descriptor);
        }
        Err(e) => {
            warn!(error = %e, "pinterest page scrape failed; falling back to extractor");
            remove_outputs(job.scratch_dir, &job.prefix()).await;
        }
    }

    let request = ExtractorRequest::new(job.url, job.output_template()).no_warnings();
    let path = run_tool(&job, extractor, &request).await?;
    let descriptor = job.finish(path).await?;
    info!(file = %descriptor.file_name, kind = %descriptor.kind, "pinterest media ready via extractor");
    Ok(descriptor)
}

async fn scrape(job: &mut Job<'_>, scraper: &Scraper<'_>) -> Result<MediaDescriptor, MediaError> {
    let page = if is_short_link(job.url, scraper.short_hosts) {
        // Follow the redirect chain to the canonical pin page.
        let page = scraper.http.fetch_page(job.url).await?;
        if let Some(resolved) = media_id_from_url(&page.final_url, Platform::Pinterest)
            .filter(|_| page.final_url.path().contains("/pin/"))
            && resolved != job.media_id
        {
            debug!(short = %job.media_id, resolved = %resolved, "resolved pin short link");
            *job = Job::new(
                job.platform,
                job.url,
                resolved,
                job.scratch_dir,
                job.max_file_size,
            );
        }
        page
    } else {
        let page_url = format!(
            "{}/pin/{}/",
            scraper.page_base.trim_end_matches('/'),
            job.media_id
        );
        scraper.http.fetch_page(&page_url).await?
    };

    let found = find_media(&page.body, &page.final_url)
        .ok_or_else(|| job.extraction_failed("no media URL in pin page"))?;
    debug!(media_url = %found.url, kind = %found.kind, "found media in pin page");

    let dest = job.output_path(found.extension());
    scraper.fetcher.fetch(&found.url, &dest).await?;
    job.finish(dest).await
}

/// Returns true when `url` is on one of the short-link `hosts`.
pub(crate) fn is_short_link(url: &str, hosts: &[String]) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.pinterest.com/pin/1/").unwrap()
    }

    #[test]
    fn test_video_patterns_win_over_images() {
        let html = r#"{"image_url":"https://i.pinimg.com/a.jpg","video_url":"https:\/\/v.pinimg.com\/b.mp4"}"#;
        let found = find_media(html, &base()).unwrap();
        assert_eq!(found.kind, MediaKind::Video);
        assert_eq!(found.url, "https://v.pinimg.com/b.mp4");
    }

    #[test]
    fn test_nested_video_list_pattern() {
        let html = r#""videos":{"id":1,"video_list":{"V_720P":{"url":"https://v.pinimg.com/720.mp4"}}}"#;
        let found = find_media(html, &base()).unwrap();
        assert_eq!(found.url, "https://v.pinimg.com/720.mp4");
    }

    #[test]
    fn test_image_fallback_patterns() {
        let cases = [
            r#"{"images":{"width":236,"orig":{"url":"https://i.pinimg.com/orig.jpg"}}}"#,
            r#"<meta property="og:image" content="https://i.pinimg.com/og.jpg">"#,
            r#"<img alt="" src="https://i.pinimg.com/main.jpg" class="hCL mainImage">"#,
            r#"<div data-test-id="pin-image" src="https://i.pinimg.com/test.jpg">"#,
        ];
        for html in cases {
            let found = find_media(html, &base()).unwrap();
            assert_eq!(found.kind, MediaKind::Image, "html: {html}");
            assert!(found.url.starts_with("https://i.pinimg.com/"));
        }
    }

    #[test]
    fn test_no_match() {
        assert_eq!(find_media("<html>nothing here</html>", &base()), None);
    }

    #[test]
    fn test_unescape_embedded_url() {
        assert_eq!(
            unescape_embedded_url(r"https:\/\/i.pinimg.com\/x.jpg?a=1\u0026b=2"),
            "https://i.pinimg.com/x.jpg?a=1&b=2"
        );
        assert_eq!(unescape_embedded_url("a?x=1&amp;y=2"), "a?x=1&y=2");
    }

    #[test]
    fn test_relative_and_protocol_relative_urls() {
        let html = r#"<meta property="og:image" content="//i.pinimg.com/p.jpg">"#;
        assert_eq!(
            find_media(html, &base()).unwrap().url,
            "https://i.pinimg.com/p.jpg"
        );
        let html = r#"<meta property="og:image" content="/static/p.jpg">"#;
        assert_eq!(
            find_media(html, &base()).unwrap().url,
            "https://www.pinterest.com/static/p.jpg"
        );
    }

    #[test]
    fn test_short_link_detection() {
        let hosts = vec!["pin.it".to_string()];
        assert!(is_short_link("https://pin.it/AbC", &hosts));
        assert!(is_short_link("https://PIN.IT/AbC", &hosts));
        assert!(!is_short_link("https://www.pinterest.com/pin/1/", &hosts));
        assert!(!is_short_link("https://pin.it/AbC", &[]));
    }
}
