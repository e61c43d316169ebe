//! Per-platform extraction strategies and the helpers they share.
//!
//! Every strategy writes under a unique stem in the caller's scratch
//! directory and either returns a verified descriptor or leaves no file of
//! its own behind.

pub(crate) mod instagram;
pub(crate) mod pinterest;
pub(crate) mod tiktok;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::MediaError;
use super::extractor::{ExtractorRequest, MediaExtractor};
use super::filename::{extension_of, output_stem};
use super::media::{MediaDescriptor, MediaKind};
use crate::platform::Platform;

/// Inputs shared by every strategy for one request.
#[derive(Debug, Clone)]
pub(crate) struct Job<'a> {
    pub platform: Platform,
    pub url: &'a str,
    pub media_id: String,
    pub scratch_dir: &'a Path,
    pub stem: String,
    pub max_file_size: u64,
}

impl<'a> Job<'a> {
    pub(crate) fn new(
        platform: Platform,
        url: &'a str,
        media_id: String,
        scratch_dir: &'a Path,
        max_file_size: u64,
    ) -> Self {
        let stem = output_stem(platform, &media_id);
        Self {
            platform,
            url,
            media_id,
            scratch_dir,
            stem,
            max_file_size,
        }
    }

    /// Prefix every file belonging to this request starts with.
    pub(crate) fn prefix(&self) -> String {
        format!("{}.", self.stem)
    }

    /// Output template for the extraction tool.
    pub(crate) fn output_template(&self) -> String {
        self.scratch_dir
            .join(format!("{}.%(ext)s", self.stem))
            .to_string_lossy()
            .into_owned()
    }

    /// Path for a file this crate writes itself.
    pub(crate) fn output_path(&self, extension: &str) -> PathBuf {
        self.scratch_dir.join(format!("{}.{extension}", self.stem))
    }

    pub(crate) fn extraction_failed(&self, detail: impl Into<String>) -> MediaError {
        MediaError::extraction_failed(self.platform, self.url, detail)
    }

    /// Validates `path` and wraps it in a descriptor.
    pub(crate) async fn finish(&self, path: PathBuf) -> Result<MediaDescriptor, MediaError> {
        let size = validate_file(&path, self.max_file_size).await?;
        let extension = extension_of(&path);
        let kind = MediaKind::classify(self.platform, extension.as_deref());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(MediaDescriptor {
            platform: self.platform,
            media_id: self.media_id.clone(),
            path,
            kind,
            file_name,
            size,
        })
    }
}

/// Runs the extraction tool once and locates its single output file.
///
/// On any failure, files carrying this request's prefix are removed.
pub(crate) async fn run_tool(
    job: &Job<'_>,
    extractor: &dyn MediaExtractor,
    request: &ExtractorRequest,
) -> Result<PathBuf, MediaError> {
    if let Err(e) = extractor.extract(request).await {
        remove_outputs(job.scratch_dir, &job.prefix()).await;
        return Err(job.extraction_failed(format!("{}: {e}", extractor.name())));
    }
    match discover_output(job.scratch_dir, &job.prefix()).await {
        Ok(Some(path)) => Ok(path),
        Ok(None) => Err(job.extraction_failed(format!(
            "{} reported success but wrote no file",
            extractor.name()
        ))),
        Err(MediaError::Io { source, .. }) => Err(job.extraction_failed(source.to_string())),
        Err(other) => Err(other),
    }
}

/// Finds the one file in `dir` whose name starts with `prefix`.
///
/// Returns `None` when nothing matches. More than one match is ambiguous;
/// every match is removed so nothing of this request is left behind.
pub(crate) async fn discover_output(
    dir: &Path,
    prefix: &str,
) -> Result<Option<PathBuf>, MediaError> {
    let mut matches = matching_files(dir, prefix).await?;
    if matches.len() > 1 {
        let count = matches.len();
        warn!(prefix, count, "extractor produced several files; discarding all");
        for path in &matches {
            let _ = tokio::fs::remove_file(path).await;
        }
        return Err(MediaError::AmbiguousOutput {
            prefix: prefix.to_string(),
            count,
        });
    }
    Ok(matches.pop())
}

/// Best-effort removal of every file in `dir` starting with `prefix`.
pub(crate) async fn remove_outputs(dir: &Path, prefix: &str) {
    let Ok(matches) = matching_files(dir, prefix).await else {
        return;
    };
    for path in matches {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed leftover output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove leftover output"),
        }
    }
}

/// Checks size bounds, deleting the file when it violates them.
///
/// # Returns
///
/// The file size in bytes.
pub(crate) async fn validate_file(path: &Path, max_size: u64) -> Result<u64, MediaError> {
    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| MediaError::io(path, e))?
        .len();
    if size == 0 {
        let _ = tokio::fs::remove_file(path).await;
        return Err(MediaError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    if size > max_size {
        let _ = tokio::fs::remove_file(path).await;
        return Err(MediaError::FileTooLarge {
            path: path.to_path_buf(),
            bytes: size,
            limit: max_size,
        });
    }
    Ok(size)
}

async fn matching_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, MediaError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| MediaError::io(dir, e))?;
    let mut matches = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MediaError::io(dir, e))?
    {
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_discover_single_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("instagram_A_1_abcdef.mp4"), b"v").unwrap();
        std::fs::write(dir.path().join("instagram_A_1_zzzzzz.mp4"), b"other request").unwrap();

        let found = discover_output(dir.path(), "instagram_A_1_abcdef.")
            .await
            .unwrap()
            .unwrap();
        assert!(found.ends_with("instagram_A_1_abcdef.mp4"));
    }

    #[tokio::test]
    async fn test_discover_zero_matches_is_none() {
        let dir = TempDir::new().unwrap();
        let result = discover_output(dir.path(), "tiktok_1_1_abcdef.").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_discover_multiple_matches_is_ambiguous_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pinterest_9_1_abcdef.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("pinterest_9_1_abcdef.jpg"), b"b").unwrap();

        let result = discover_output(dir.path(), "pinterest_9_1_abcdef.").await;
        assert!(matches!(
            result,
            Err(MediaError::AmbiguousOutput { count: 2, .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_validate_file_bounds() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            validate_file(&empty, 10).await,
            Err(MediaError::EmptyFile { .. })
        ));
        assert!(!empty.exists());

        let big = dir.path().join("big.mp4");
        std::fs::write(&big, vec![0u8; 11]).unwrap();
        assert!(matches!(
            validate_file(&big, 10).await,
            Err(MediaError::FileTooLarge { bytes: 11, .. })
        ));
        assert!(!big.exists());

        let ok = dir.path().join("ok.mp4");
        std::fs::write(&ok, vec![0u8; 10]).unwrap();
        assert_eq!(validate_file(&ok, 10).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_remove_outputs_only_touches_prefix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tiktok_1_1_aaaaaa.mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("tiktok_1_1_bbbbbb.mp4"), b"x").unwrap();

        remove_outputs(dir.path(), "tiktok_1_1_aaaaaa.").await;

        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(left, vec!["tiktok_1_1_bbbbbb.mp4".to_string()]);
    }

    #[test]
    fn test_job_paths_share_prefix() {
        let dir = Path::new("/scratch/42");
        let job = Job::new(Platform::Instagram, "https://x", "ABC".to_string(), dir, 10);
        assert!(job.output_template().ends_with(".%(ext)s"));
        assert!(
            job.output_path("jpg")
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(&job.prefix())
        );
        assert!(job.stem.starts_with("instagram_ABC_"));
    }

    #[test]
    fn test_output_template_has_only_the_extension_field() {
        let dir = Path::new("/scratch/1");
        let job = Job::new(
            Platform::Instagram,
            "https://www.instagram.com/p/%(title)s/",
            "%(title)s".to_string(),
            dir,
            10,
        );
        let template = job.output_template();
        assert_eq!(template.matches('%').count(), 1);
        assert!(template.ends_with(".%(ext)s"));
        let produced = template.replace("%(ext)s", "mp4");
        assert!(
            Path::new(&produced)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(&job.prefix())
        );
    }
}
