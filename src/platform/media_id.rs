//! Platform-specific media identifier extraction.
//!
//! Identifiers come from URL structure only; no network access happens here.
//! The same URL always yields the same identifier.

use url::Url;

use super::{Platform, parse_http_url};

/// TikTok hosts whose whole path is a short code.
pub const TIKTOK_SHORT_HOSTS: &[&str] = &["vm.tiktok.com", "vt.tiktok.com", "m.tiktok.com"];

/// Pinterest short-link host.
pub const PINTEREST_SHORT_HOST: &str = "pin.it";

/// Instagram path segments that precede a shortcode.
const INSTAGRAM_MARKERS: &[&str] = &["p", "reel", "tv"];

/// Extracts the media identifier for `platform` from raw text.
///
/// Returns `None` when the text is not a URL or no rule matches; callers must
/// treat that as unrecoverable for the URL.
#[must_use]
pub fn extract_media_id(raw: &str, platform: Platform) -> Option<String> {
    let url = parse_http_url(raw)?;
    media_id_from_url(&url, platform)
}

/// Extracts the media identifier from a parsed URL.
#[must_use]
pub fn media_id_from_url(url: &Url, platform: Platform) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let path = url.path();
    let id = match platform {
        Platform::Instagram => instagram_id(path),
        Platform::TikTok => tiktok_id(&host, path),
        Platform::Pinterest => pinterest_id(&host, path),
    }?;
    (!id.is_empty()).then_some(id)
}

fn instagram_id(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    segments.windows(2).find_map(|pair| {
        (INSTAGRAM_MARKERS.contains(&pair[0]) && !pair[1].is_empty())
            .then(|| pair[1].to_string())
    })
}

fn tiktok_id(host: &str, path: &str) -> Option<String> {
    if TIKTOK_SHORT_HOSTS.contains(&host) {
        return Some(path.trim_matches('/').to_string());
    }
    if path.contains("/t/") {
        return segment_after(path, "t");
    }
    if path.contains('@') && path.contains("/video/") {
        let segment = segment_after(path, "video")?;
        let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
        return (!digits.is_empty()).then_some(digits);
    }
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "t")
        .next_back()
        .map(str::to_string)
}

fn pinterest_id(host: &str, path: &str) -> Option<String> {
    if host == PINTEREST_SHORT_HOST {
        return Some(path.trim_matches('/').to_string());
    }
    segment_after(path, "pin")
}

/// The whole path of a short link, used as its identifier.
#[must_use]
pub fn short_code(url: &Url) -> Option<String> {
    let code = url.path().trim_matches('/');
    (!code.is_empty()).then(|| code.to_string())
}

/// Returns the non-empty segment directly following the first `marker` segment.
fn segment_after(path: &str, marker: &str) -> Option<String> {
    let mut segments = path.split('/');
    segments.by_ref().find(|segment| *segment == marker)?;
    segments
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
