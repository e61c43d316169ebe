//! External media-extraction tool seam.
//!
//! The engine never scrapes Instagram or TikTok itself; it hands the URL to a
//! command-line extractor (yt-dlp by default) together with an output
//! template, then looks for the file the tool wrote.
//!
//! # Object Safety
//!
//! [`MediaExtractor`] uses `async_trait` so the engine can hold an
//! `Arc<dyn MediaExtractor>` and tests can swap in fakes.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::constants::{DEFAULT_EXTRACTOR_TIMEOUT, MAX_STDERR_EXCERPT};

/// Default extractor program name, resolved through `PATH`.
pub const DEFAULT_EXTRACTOR_PROGRAM: &str = "yt-dlp";

/// One invocation of the extraction tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorRequest {
    /// Page URL to extract from.
    pub url: String,
    /// Output template; the tool substitutes the extension for `%(ext)s`.
    pub output_template: String,
    /// User-agent override.
    pub user_agent: Option<String>,
    /// Extra request headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
    /// Format selector, e.g. `best`.
    pub format: Option<String>,
    /// Skip TLS certificate validation.
    pub no_check_certificate: bool,
    /// Suppress progress output.
    pub quiet: bool,
    /// Suppress warnings.
    pub no_warnings: bool,
}

impl ExtractorRequest {
    /// Starts a request with no overrides.
    #[must_use]
    pub fn new(url: impl Into<String>, output_template: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_template: output_template.into(),
            user_agent: None,
            headers: Vec::new(),
            format: None,
            no_check_certificate: false,
            quiet: false,
            no_warnings: false,
        }
    }

    /// Sets the user-agent override.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds one request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the format selector.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Disables certificate checks.
    #[must_use]
    pub fn no_check_certificate(mut self) -> Self {
        self.no_check_certificate = true;
        self
    }

    /// Silences progress output.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Silences warnings.
    #[must_use]
    pub fn no_warnings(mut self) -> Self {
        self.no_warnings = true;
        self
    }
}

/// Why an extractor invocation failed.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran past its deadline and was killed.
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        /// Program that was launched.
        program: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The program exited unsuccessfully.
    #[error("extractor exited with code {code:?}: {stderr}")]
    Failed {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Trimmed stderr excerpt, for logs.
        stderr: String,
    },
}

/// An external tool that writes media for a URL to an output template.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Runs the tool once. Success means the tool reported success; the
    /// caller still has to find and validate the output.
    async fn extract(&self, request: &ExtractorRequest) -> Result<(), ExtractorError>;
}

/// yt-dlp invoked as a subprocess.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: String,
    timeout: Duration,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRACTOR_PROGRAM, DEFAULT_EXTRACTOR_TIMEOUT)
    }
}

impl YtDlpExtractor {
    /// Uses `program` (a name on `PATH` or a path) with a per-run deadline.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// The configured program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command-line arguments for `request`, in invocation order.
    #[must_use]
    pub fn build_args(request: &ExtractorRequest) -> Vec<String> {
        let mut args = Vec::new();
        if request.no_warnings {
            args.push("--no-warnings".to_string());
        }
        if request.quiet {
            args.push("--quiet".to_string());
        }
        if let Some(user_agent) = &request.user_agent {
            args.push("--user-agent".to_string());
            args.push(user_agent.clone());
        }
        for (name, value) in &request.headers {
            args.push("--add-header".to_string());
            args.push(format!("{name}: {value}"));
        }
        if let Some(format) = &request.format {
            args.push("--format".to_string());
            args.push(format.clone());
        }
        if request.no_check_certificate {
            args.push("--no-check-certificate".to_string());
        }
        args.push("-o".to_string());
        args.push(request.output_template.clone());
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip(self, request), fields(program = %self.program, url = %request.url))]
    async fn extract(&self, request: &ExtractorRequest) -> Result<(), ExtractorError> {
        let args = Self::build_args(request);
        debug!(?args, "invoking extractor");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ExtractorError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "extractor timed out");
                return Err(ExtractorError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if output.status.success() {
            debug!("extractor succeeded");
            return Ok(());
        }

        let stderr = stderr_excerpt(&output.stderr);
        warn!(code = ?output.status.code(), stderr = %stderr, "extractor failed");
        Err(ExtractorError::Failed {
            code: output.status.code(),
            stderr,
        })
    }
}

/// Lossy-decodes and trims stderr, keeping at most the last
/// `MAX_STDERR_EXCERPT` characters, which is where yt-dlp puts the error.
fn stderr_excerpt(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_STDERR_EXCERPT {
        return text.to_string();
    }
    text.chars().skip(count - MAX_STDERR_EXCERPT).collect()
}
