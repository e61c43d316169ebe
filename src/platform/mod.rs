//! Platform classification for inbound links.
//!
//! A link is classified in two steps: it must parse as a URL with both a
//! scheme and a host, and its host must equal or contain one of the domains
//! registered for a platform. Classification never fails loudly; anything
//! that does not match yields `None`.
//!
//! # Example
//!
//! ```
//! use mediabot_core::platform::{Platform, PlatformRegistry};
//!
//! let registry = PlatformRegistry::default();
//! assert_eq!(
//!     registry.classify("https://www.instagram.com/p/ABC123/"),
//!     Some(Platform::Instagram)
//! );
//! assert_eq!(registry.classify("https://example.com/foo"), None);
//! assert_eq!(registry.classify("not a url"), None);
//! ```

mod media_id;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use url::Url;

pub use media_id::{
    PINTEREST_SHORT_HOST, TIKTOK_SHORT_HOSTS, extract_media_id, media_id_from_url, short_code,
};

/// One of the supported content sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Posts, reels and IGTV.
    Instagram,
    /// Videos and photo slideshows, including short links.
    TikTok,
    /// Pins, including `pin.it` short links.
    Pinterest,
}

impl Platform {
    /// Every supported platform, in classification order.
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::TikTok, Platform::Pinterest];

    /// Lowercase identifier used in filenames and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::TikTok => "tiktok",
            Self::Pinterest => "pinterest",
        }
    }

    /// Capitalized name used in captions.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Instagram => "Instagram",
            Self::TikTok => "TikTok",
            Self::Pinterest => "Pinterest",
        }
    }

    /// Built-in domain list for this platform.
    #[must_use]
    pub fn default_domains(self) -> &'static [&'static str] {
        match self {
            Self::Instagram => &["instagram.com", "instagr.am"],
            Self::TikTok => &["tiktok.com"],
            Self::Pinterest => &["pinterest.com", "pinterest.co.uk", "pin.it"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building a [`PlatformRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A platform was registered without any domain.
    #[error("no domains configured for {platform}")]
    EmptyDomains {
        /// The platform with the empty list.
        platform: Platform,
    },

    /// Substring matching would let one platform's domain match another's host.
    #[error("domain '{first}' ({first_platform}) overlaps '{second}' ({second_platform})")]
    OverlappingDomains {
        /// First domain of the overlapping pair.
        first: String,
        /// Platform owning `first`.
        first_platform: Platform,
        /// Second domain of the overlapping pair.
        second: String,
        /// Platform owning `second`.
        second_platform: Platform,
    },
}

/// Maps URL hosts to platforms using per-platform domain lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRegistry {
    entries: Vec<(Platform, Vec<String>)>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self {
            entries: Platform::ALL
                .iter()
                .map(|platform| {
                    let domains = platform
                        .default_domains()
                        .iter()
                        .map(|d| (*d).to_string())
                        .collect();
                    (*platform, domains)
                })
                .collect(),
        }
    }
}

impl PlatformRegistry {
    /// Builds a registry from explicit domain lists.
    ///
    /// Domains are trimmed and lowercased. Platforms missing from `entries`
    /// are simply not recognized.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyDomains`] for a platform with no usable
    /// domain and [`RegistryError::OverlappingDomains`] when a domain of one
    /// platform is a substring of a domain of another.
    pub fn new<I>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (Platform, Vec<String>)>,
    {
        let mut normalized: Vec<(Platform, Vec<String>)> = Vec::new();
        for (platform, domains) in entries {
            let domains: Vec<String> = domains
                .iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
            if domains.is_empty() {
                return Err(RegistryError::EmptyDomains { platform });
            }
            normalized.retain(|(existing, _)| *existing != platform);
            normalized.push((platform, domains));
        }
        normalized.sort_by_key(|(platform, _)| *platform);
        check_overlaps(&normalized)?;
        Ok(Self {
            entries: normalized,
        })
    }

    /// Domains registered for `platform` (empty when not registered).
    #[must_use]
    pub fn domains(&self, platform: Platform) -> &[String] {
        self.entries
            .iter()
            .find(|(p, _)| *p == platform)
            .map_or(&[], |(_, domains)| domains.as_slice())
    }

    /// Classifies raw text. Returns `None` for invalid URLs and unknown hosts.
    #[must_use]
    pub fn classify(&self, raw: &str) -> Option<Platform> {
        let url = parse_http_url(raw)?;
        self.classify_url(&url)
    }

    /// Classifies an already parsed URL by host.
    #[must_use]
    pub fn classify_url(&self, url: &Url) -> Option<Platform> {
        let host = url.host_str()?.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(_, domains)| {
                domains
                    .iter()
                    .any(|domain| host == *domain || host.contains(domain.as_str()))
            })
            .map(|(platform, _)| *platform)
    }
}

fn check_overlaps(entries: &[(Platform, Vec<String>)]) -> Result<(), RegistryError> {
    for (index, (first_platform, first_domains)) in entries.iter().enumerate() {
        for (second_platform, second_domains) in &entries[index + 1..] {
            for first in first_domains {
                for second in second_domains {
                    if first.contains(second.as_str()) || second.contains(first.as_str()) {
                        return Err(RegistryError::OverlappingDomains {
                            first: first.clone(),
                            first_platform: *first_platform,
                            second: second.clone(),
                            second_platform: *second_platform,
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Parses text as a URL that has both a scheme and a non-empty host.
///
/// Surrounding whitespace is ignored. Returns `None` instead of an error for
/// anything else, including the empty string.
#[must_use]
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let url = Url::parse(trimmed).ok()?;
    let has_host = url.host_str().is_some_and(|host| !host.is_empty());
    has_host.then_some(url)
}

/// Returns true if `raw` has a scheme and a host.
#[must_use]
pub fn is_valid_url(raw: &str) -> bool {
    parse_http_url(raw).is_some()
}
