//! Scratch storage for downloads awaiting delivery.
//!
//! Layout is `<root>/<user_id>/<files>`. The root is created at start-up,
//! per-user directories are created lazily and idempotently, and the whole
//! root is wiped and recreated on a fixed interval by [`StorageManager::spawn_purge_task`].
//!
//! The purge does not coordinate with in-flight requests. A purge that lands
//! between a download finishing and its delivery removes the file, and that
//! request then fails with a download error. Whether the purge should skip
//! recently used directories or requests should hold a lease is unresolved.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::request::UserId;

/// Default purge interval (one hour).
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Errors from scratch storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error at `path`.
    #[error("storage IO error at {path}: {source}")]
    Io {
        /// Path where the operation failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Owner of the process-wide scratch root.
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
}

impl StorageManager {
    /// Creates a manager for `root`. Nothing is touched on disk yet.
    ///
    /// A relative `root` is anchored at the current directory so paths
    /// handed out stay valid if the working directory changes.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    /// The scratch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the scratch root if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))
    }

    /// Returns the scratch directory for `user_id`, creating it if absent.
    ///
    /// Safe to call concurrently for the same user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the directory cannot be created.
    pub async fn user_dir(&self, user_id: UserId) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(user_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;
        Ok(dir)
    }

    /// Removes everything under the root, then recreates the empty root.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when removal or re-creation fails. A root
    /// that is already missing is not an error.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn purge(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!("scratch root removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => debug!("scratch root already absent"),
            Err(e) => return Err(StorageError::io(&self.root, e)),
        }
        self.ensure_root().await?;
        info!("scratch storage purged");
        Ok(())
    }

    /// Spawns the background purge loop.
    ///
    /// The first purge runs one `interval` after the call; failures are logged
    /// and the loop keeps going. Abort the returned handle to stop it.
    #[must_use = "dropping the handle detaches the purge task; keep it to abort on shutdown"]
    pub fn spawn_purge_task(&self, interval: Duration) -> JoinHandle<()> {
        let storage = self.clone();
        info!(
            root = %storage.root.display(),
            interval_secs = interval.as_secs(),
            "starting scratch purge task"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = storage.purge().await {
                    error!(error = %e, "scheduled scratch purge failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_root_creates_nested_root() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("a").join("b"));
        storage.ensure_root().await.unwrap();
        assert!(storage.root().is_dir());
        // Idempotent.
        storage.ensure_root().await.unwrap();
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let storage = StorageManager::new("temp");
        assert!(storage.root().is_absolute());
        assert_eq!(
            storage.root(),
            std::env::current_dir().unwrap().join("temp")
        );
    }

    #[tokio::test]
    async fn test_user_dir_is_absolute() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("scratch"));
        let dir = storage.user_dir(8).await.unwrap();
        assert!(dir.is_absolute());
        assert!(dir.starts_with(storage.root()));
    }

    #[tokio::test]
    async fn test_user_dir_is_created_lazily_and_idempotently() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("scratch"));
        let first = storage.user_dir(42).await.unwrap();
        let second = storage.user_dir(42).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert!(first.ends_with("42"));
    }

    #[tokio::test]
    async fn test_concurrent_user_dir_creation() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("scratch"));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move { storage.user_dir(5).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_purge_wipes_and_recreates_root() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("scratch"));
        let dir = storage.user_dir(1).await.unwrap();
        std::fs::write(dir.join("file.mp4"), b"data").unwrap();

        storage.purge().await.unwrap();

        assert!(storage.root().is_dir());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_purge_tolerates_missing_root() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("never-created"));
        storage.purge().await.unwrap();
        assert!(storage.root().is_dir());
    }

    #[tokio::test]
    async fn test_purge_task_runs_on_interval() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().join("scratch"));
        let dir = storage.user_dir(3).await.unwrap();
        let file = dir.join("stale.jpg");
        std::fs::write(&file, b"x").unwrap();

        let handle = storage.spawn_purge_task(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.abort();

        assert!(!file.exists(), "purge task should remove stale files");
    }
}
