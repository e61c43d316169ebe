//! Scoped ownership of a delivered scratch file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Deletes its file when released or dropped.
///
/// Release is best effort: failures are logged and never propagated. Prefer
/// [`MediaLease::release`] in async code; `Drop` is the fallback for early
/// returns and unwinding.
#[derive(Debug)]
pub struct MediaLease {
    path: PathBuf,
    released: bool,
}

impl MediaLease {
    /// Takes ownership of the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }

    /// The leased file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the leased file is still on disk. Errors count as absent.
    pub async fn is_present(&self) -> bool {
        match tokio::fs::try_exists(&self.path).await {
            Ok(present) => present,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot stat media file");
                false
            }
        }
    }

    /// Deletes the file now.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "released media file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "media file already gone");
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove media file"),
        }
    }
}

impl Drop for MediaLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released media file on drop"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove media file"),
        }
    }
}
