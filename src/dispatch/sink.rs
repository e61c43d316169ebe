//! Outbound channel seam.
//!
//! The chat front end implements [`DeliverySink`]; the crate ships
//! [`DirectorySink`], which copies files into a local directory, for the
//! console front end and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use super::outcome::Notice;
use crate::download::{MediaDescriptor, MediaKind};
use crate::request::UserId;

/// How the outbound channel should send a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Streamable video message.
    Video,
    /// Photo message.
    Photo,
    /// Animation (GIF) message.
    Animation,
    /// Generic file attachment.
    Document,
}

impl Transport {
    /// Transport used for a media kind.
    #[must_use]
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => Self::Video,
            MediaKind::Image => Self::Photo,
            MediaKind::Animation => Self::Animation,
            MediaKind::Document => Self::Document,
        }
    }
}

/// One file handed to the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<'a> {
    /// The verified media.
    pub media: &'a MediaDescriptor,
    /// Channel transport for `media.kind`.
    pub transport: Transport,
    /// Caption attached to the message.
    pub caption: String,
}

/// Why the outbound channel could not send a file.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The channel rejected the file as too large.
    #[error("file of {size} bytes rejected as too large")]
    TooLarge {
        /// Size of the rejected file.
        size: u64,
    },

    /// Local IO failed while handing the file over.
    #[error("IO error delivering {path}: {source}")]
    Io {
        /// File being delivered.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// The outbound half of the chat front end.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Shows a progress or failure notice to `user_id`.
    async fn notify(&self, user_id: UserId, notice: Notice);

    /// Sends a file to `user_id`. The file is deleted after this returns,
    /// whatever the result.
    async fn deliver(&self, user_id: UserId, delivery: &Delivery<'_>) -> Result<(), DeliveryError>;
}

/// Copies delivered files to `<root>/<user_id>/<file_name>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
    max_upload: Option<u64>,
}

impl DirectorySink {
    /// Delivers into `root` without a size ceiling.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_upload: None,
        }
    }

    /// Rejects files larger than `bytes`, like an upload-limited channel.
    #[must_use]
    pub fn with_max_upload(mut self, bytes: u64) -> Self {
        self.max_upload = Some(bytes);
        self
    }

    /// The delivery root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    async fn notify(&self, user_id: UserId, notice: Notice) {
        info!(user_id, notice = notice.message(), "notice");
    }

    #[instrument(skip(self, delivery), fields(file = %delivery.media.file_name))]
    async fn deliver(&self, user_id: UserId, delivery: &Delivery<'_>) -> Result<(), DeliveryError> {
        let media = delivery.media;
        if let Some(limit) = self.max_upload
            && media.size > limit
        {
            return Err(DeliveryError::TooLarge { size: media.size });
        }

        let dir = self.root.join(user_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| DeliveryError::Io {
                path: dir.clone(),
                source,
            })?;
        let dest = dir.join(&media.file_name);
        tokio::fs::copy(&media.path, &dest)
            .await
            .map_err(|source| DeliveryError::Io {
                path: media.path.clone(),
                source,
            })?;
        info!(
            user_id,
            dest = %dest.display(),
            transport = ?delivery.transport,
            caption = %delivery.caption,
            "media delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use tempfile::TempDir;

    fn descriptor(path: PathBuf, size: u64) -> MediaDescriptor {
        MediaDescriptor {
            platform: Platform::Pinterest,
            media_id: "1".to_string(),
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            kind: MediaKind::Image,
            size,
        }
    }

    #[test]
    fn test_transport_mapping() {
        assert_eq!(Transport::for_kind(MediaKind::Video), Transport::Video);
        assert_eq!(Transport::for_kind(MediaKind::Image), Transport::Photo);
        assert_eq!(
            Transport::for_kind(MediaKind::Animation),
            Transport::Animation
        );
        assert_eq!(
            Transport::for_kind(MediaKind::Document),
            Transport::Document
        );
    }

    #[tokio::test]
    async fn test_directory_sink_copies_file() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let src = scratch.path().join("pinterest_1_1_abcdef.jpg");
        std::fs::write(&src, b"jpeg").unwrap();
        let media = descriptor(src.clone(), 4);

        let sink = DirectorySink::new(out.path());
        let delivery = Delivery {
            media: &media,
            transport: Transport::Photo,
            caption: "c | Pinterest".to_string(),
        };
        sink.deliver(9, &delivery).await.unwrap();

        let copied = out.path().join("9").join("pinterest_1_1_abcdef.jpg");
        assert_eq!(std::fs::read(copied).unwrap(), b"jpeg");
        assert!(src.exists(), "the sink copies; cleanup belongs to the lease");
    }

    #[tokio::test]
    async fn test_directory_sink_upload_limit() {
        let scratch = TempDir::new().unwrap();
        let src = scratch.path().join("big.jpg");
        std::fs::write(&src, vec![0u8; 10]).unwrap();
        let media = descriptor(src, 10);

        let sink = DirectorySink::new(scratch.path().join("out")).with_max_upload(5);
        let delivery = Delivery {
            media: &media,
            transport: Transport::Photo,
            caption: String::new(),
        };
        assert!(matches!(
            sink.deliver(1, &delivery).await,
            Err(DeliveryError::TooLarge { size: 10 })
        ));
    }
}
