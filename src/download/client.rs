//! HTTP client wrapper for page fetches and streamed file downloads.
//!
//! This module provides the `HttpClient` struct which owns one pooled
//! `reqwest` client configured with browser headers and per-attempt timeouts.
//! Each method performs exactly one attempt; retry lives in
//! [`Fetcher`](super::Fetcher).

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::DEFAULT_REQUEST_TIMEOUT;
use super::error::DownloadError;
use crate::user_agent::{BROWSER_USER_AGENT, browser_headers};

/// HTTP client for page fetches and streaming downloads.
///
/// This client is designed to be created once and reused for every request,
/// taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects.
    pub final_url: Url,
    /// Response body decoded as text.
    pub body: String,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default 30 second connect/read timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client whose connect and per-read timeouts are `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .gzip(true)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .build()?;
        Ok(Self { client })
    }

    /// Fetches a page, following redirects, and returns its final URL and body.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, network failures, timeouts
    /// and non-success statuses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<Page, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self.send_get(url).await?;
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        debug!(final_url = %final_url, bytes = body.len(), "page fetched");
        Ok(Page { final_url, body })
    }

    /// Streams `url` into `dest`, enforcing `max_size`.
    ///
    /// A declared Content-Length above `max_size` is rejected before the file
    /// is created. While streaming, crossing `max_size` aborts the transfer.
    /// On every error path the partially written file is removed.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::FileTooLarge`], [`DownloadError::EmptyFile`],
    /// or the network/IO error that interrupted the attempt.
    #[instrument(skip(self, dest), fields(url = %url, dest = %dest.display()))]
    pub async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        max_size: u64,
    ) -> Result<u64, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self.send_get(url).await?;

        if let Some(declared) = response.content_length()
            && declared > max_size
        {
            warn!(declared, limit = max_size, "declared size exceeds limit");
            return Err(DownloadError::too_large(url, declared, max_size));
        }

        let file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        // Stream response body to file, with cleanup on error
        let stream_result = stream_to_file(file, response, url, dest, max_size).await;
        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %dest.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(dest).await;
                return Err(e);
            }
        };

        if bytes_written == 0 {
            warn!("server returned an empty body");
            let _ = tokio::fs::remove_file(dest).await;
            return Err(DownloadError::empty(url));
        }

        info!(path = %dest.display(), bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Streams response body to file, returning bytes written.
///
/// Takes ownership of the file so the handle is closed before the caller
/// removes it on error.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    max_size: u64,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        bytes_written += chunk.len() as u64;
        if bytes_written > max_size {
            warn!(bytes_written, limit = max_size, "streamed size exceeds limit");
            return Err(DownloadError::too_large(url, bytes_written, max_size));
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    const LIMIT: u64 = 1024;

    #[tokio::test]
    async fn test_download_once_writes_body() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video bytes"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let dest = temp_dir.path().join("out.mp4");
        let url = format!("{}/clip.mp4", mock_server.uri());

        let bytes = client.download_once(&url, &dest, LIMIT).await.unwrap();
        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn test_download_once_sends_browser_headers() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .and(header("user-agent", BROWSER_USER_AGENT))
            .and(header("referer", "https://www.google.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/img.jpg", mock_server.uri());
        let result = client
            .download_once(&url, &temp_dir.path().join("img.jpg"), LIMIT)
            .await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_leaves_no_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/huge.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let dest = temp_dir.path().join("huge.mp4");
        let url = format!("{}/huge.mp4", mock_server.uri());

        let result = client.download_once(&url, &dest, LIMIT).await;
        assert!(matches!(
            result,
            Err(DownloadError::FileTooLarge { limit: LIMIT, .. })
        ));
        assert!(!dest.exists());
    }

    /// Serves one chunked response with no `Content-Length`, or `None` when
    /// localhost cannot be bound.
    async fn serve_chunked_once(chunks: Vec<Vec<u8>>) -> Option<String> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let mut response =
                b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
                    .to_vec();
            for chunk in chunks {
                response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                response.extend_from_slice(&chunk);
                response.extend_from_slice(b"\r\n");
            }
            response.extend_from_slice(b"0\r\n\r\n");
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        Some(format!("http://{addr}/stream.mp4"))
    }

    #[tokio::test]
    async fn test_undeclared_length_over_limit_stops_stream_and_leaves_no_file() {
        let Some(url) = serve_chunked_once(vec![vec![1u8; 600], vec![2u8; 600]]).await else {
            eprintln!("cannot bind localhost; skipping");
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("stream.mp4");

        let result = HttpClient::new().download_once(&url, &dest, LIMIT).await;

        match result {
            Err(DownloadError::FileTooLarge { bytes, limit, .. }) => {
                assert_eq!(limit, LIMIT);
                assert!(bytes > LIMIT);
            }
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
        assert!(!dest.exists(), "partial file must be removed");
    }

    #[tokio::test]
    async fn test_undeclared_length_within_limit_is_written() {
        let Some(url) = serve_chunked_once(vec![b"abc".to_vec(), b"def".to_vec()]).await else {
            eprintln!("cannot bind localhost; skipping");
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("stream.mp4");

        let written = HttpClient::new()
            .download_once(&url, &dest, LIMIT)
            .await
            .unwrap();

        assert_eq!(written, 6);
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_empty_body_leaves_no_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/empty.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let dest = temp_dir.path().join("empty.jpg");
        let url = format!("{}/empty.jpg", mock_server.uri());

        let result = client.download_once(&url, &dest, LIMIT).await;
        assert!(matches!(result, Err(DownloadError::EmptyFile { .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/missing.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let dest = temp_dir.path().join("missing.mp4");
        let url = format!("{}/missing.mp4", mock_server.uri());

        match client.download_once(&url, &dest, LIMIT).await {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let client = HttpClient::new();
        let result = client
            .download_once("not-a-valid-url", &temp_dir.path().join("x"), LIMIT)
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_page_follows_redirects() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/short"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/pin/98765/", mock_server.uri())),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pin/98765/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>pin</html>"))
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let page = client
            .fetch_page(&format!("{}/short", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(page.final_url.path(), "/pin/98765/");
        assert_eq!(page.body, "<html>pin</html>");
    }

    #[test]
    fn test_default_equivalent_to_new() {
        let client = HttpClient::default();
        let _ = client.inner();
    }
}
