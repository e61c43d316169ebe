//! Media kinds and the descriptor returned by a successful download.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::platform::Platform;

/// What a downloaded file contains, as far as delivery is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Video clip.
    Video,
    /// Still image.
    Image,
    /// Looping animation (GIF).
    Animation,
    /// Anything else; delivered as a generic file.
    Document,
}

impl MediaKind {
    /// Classifies a file produced for `platform` by its extension.
    ///
    /// Instagram and Pinterest treat `mp4`/`mov` as video and everything else
    /// as an image. TikTok defaults to video, with image extensions and `gif`
    /// carved out.
    #[must_use]
    pub fn classify(platform: Platform, extension: Option<&str>) -> Self {
        let ext = extension.map(str::to_ascii_lowercase);
        let ext = ext.as_deref();
        match platform {
            Platform::Instagram | Platform::Pinterest => match ext {
                Some("mp4" | "mov") => Self::Video,
                _ => Self::Image,
            },
            Platform::TikTok => match ext {
                Some("jpg" | "jpeg" | "png" | "webp") => Self::Image,
                Some("gif") => Self::Animation,
                _ => Self::Video,
            },
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Animation => "animation",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified file in scratch storage.
///
/// When returned, the file at `path` exists and its size is within
/// `1..=max_file_size`. Ownership of the file passes to whoever consumes the
/// descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaDescriptor {
    /// Source platform.
    pub platform: Platform,
    /// Identifier derived from the request URL.
    pub media_id: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Delivery classification.
    pub kind: MediaKind,
    /// Final path component of `path`.
    pub file_name: String,
    /// Size in bytes at verification time.
    pub size: u64,
}

impl MediaDescriptor {
    /// The file's location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
