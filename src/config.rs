//! Runtime configuration.
//!
//! Values come from, lowest to highest priority: built-in defaults, an
//! optional `key = value` file, `MEDIABOT_*` environment variables and
//! finally command-line flags (applied by the binary).
//!
//! ```text
//! # ~/.config/mediabot/config.toml
//! rate_limit_count = 5
//! rate_limit_period_secs = 60
//! temp_dir = "temp"
//! tiktok_domains = "tiktok.com, vm.tiktok.com"
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::download::constants::{
    DEFAULT_EXTRACTOR_TIMEOUT, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_DELAY,
};
use crate::download::{
    DEFAULT_EXTRACTOR_PROGRAM, DEFAULT_PINTEREST_PAGE_BASE, DownloadSettings, RetryPolicy,
};
use crate::limiter::{DEFAULT_RATE_LIMIT, DEFAULT_RATE_PERIOD};
use crate::platform::{PINTEREST_SHORT_HOST, Platform, PlatformRegistry, RegistryError};
use crate::storage::DEFAULT_PURGE_INTERVAL;

/// Prefix of environment variables read by [`Config::apply_env`].
pub const ENV_PREFIX: &str = "MEDIABOT_";

const MAX_TIMEOUT_SECS: u64 = 3600;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A line is not of the form `key = value`.
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax {
        /// 1-based line number.
        line: usize,
    },

    /// The key is not recognized.
    #[error("unknown configuration key: '{key}'")]
    UnknownKey {
        /// The offending key.
        key: String,
    },

    /// The value could not be parsed for its key.
    #[error("invalid value '{value}' for `{key}`: {reason}")]
    InvalidValue {
        /// Key being set.
        key: String,
        /// Raw value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },

    /// A parsed value is outside its allowed range.
    #[error("invalid config value for `{key}`: {reason}")]
    OutOfRange {
        /// Offending key.
        key: &'static str,
        /// Allowed range.
        reason: String,
    },

    /// The domain lists cannot form a registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Complete runtime configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Chat channel credential. Never logged.
    pub api_token: Option<String>,
    /// Admissions allowed per user within `rate_limit_period`.
    pub rate_limit_count: usize,
    /// Sliding window length.
    pub rate_limit_period: Duration,
    /// Attempts per streamed download.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Connect and read timeout for HTTP requests.
    pub request_timeout: Duration,
    /// Wall-clock limit for one extraction tool run.
    pub extractor_timeout: Duration,
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
    /// Scratch root.
    pub temp_dir: PathBuf,
    /// How often the scratch root is wiped.
    pub purge_interval: Duration,
    /// Optional cap on requests downloading at once.
    pub max_concurrent_requests: Option<usize>,
    /// Extraction tool executable.
    pub extractor_binary: String,
    /// Origin for canonical Pinterest pin pages.
    pub pinterest_page_base: String,
    /// Pinterest short-link hosts.
    pub pinterest_short_hosts: Vec<String>,
    /// Caption prefix for delivered media.
    pub caption: String,
    /// Host substrings per platform.
    pub domains: Vec<(Platform, Vec<String>)>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("rate_limit_count", &self.rate_limit_count)
            .field("rate_limit_period", &self.rate_limit_period)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("request_timeout", &self.request_timeout)
            .field("extractor_timeout", &self.extractor_timeout)
            .field("max_file_size", &self.max_file_size)
            .field("temp_dir", &self.temp_dir)
            .field("purge_interval", &self.purge_interval)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("extractor_binary", &self.extractor_binary)
            .field("pinterest_page_base", &self.pinterest_page_base)
            .field("pinterest_short_hosts", &self.pinterest_short_hosts)
            .field("caption", &self.caption)
            .field("domains", &self.domains)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            rate_limit_count: DEFAULT_RATE_LIMIT,
            rate_limit_period: DEFAULT_RATE_PERIOD,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            extractor_timeout: DEFAULT_EXTRACTOR_TIMEOUT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            temp_dir: PathBuf::from("temp"),
            purge_interval: DEFAULT_PURGE_INTERVAL,
            max_concurrent_requests: None,
            extractor_binary: DEFAULT_EXTRACTOR_PROGRAM.to_string(),
            pinterest_page_base: DEFAULT_PINTEREST_PAGE_BASE.to_string(),
            pinterest_short_hosts: vec![PINTEREST_SHORT_HOST.to_string()],
            caption: crate::dispatch::DEFAULT_CAPTION.to_string(),
            domains: Platform::ALL
                .iter()
                .map(|p| {
                    let domains = p.default_domains().iter().map(|d| (*d).to_string()).collect();
                    (*p, domains)
                })
                .collect(),
        }
    }
}

/// Resolves the default config file path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediabot/config.toml`
/// 2. `$HOME/.config/mediabot/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("mediabot").join("config.toml"));
    }
    let home = env_var_non_empty("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mediabot")
            .join("config.toml"),
    )
}

fn env_var_non_empty(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

impl Config {
    /// Applies `key = value` lines. `#` starts a comment outside quotes;
    /// string values may be double-quoted.
    ///
    /// # Errors
    ///
    /// Returns the first syntax, key or value error, with its line number
    /// where applicable.
    pub fn apply_str(&mut self, raw: &str) -> Result<(), ConfigError> {
        for (index, raw_line) in raw.lines().enumerate() {
            let line = strip_inline_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax { line: index + 1 });
            };
            let value = unquote(value.trim());
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    /// Applies a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file is unreadable, otherwise
    /// whatever [`Config::apply_str`] returns.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "applying config file");
        self.apply_str(&raw)
    }

    /// Applies `MEDIABOT_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::apply_vars`].
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(env::vars())
    }

    /// Applies `MEDIABOT_<KEY>` pairs; other names are ignored.
    /// `MEDIABOT_RATE_LIMIT_COUNT=3` sets `rate_limit_count`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown key under the prefix or a bad value.
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let Some(key) = name.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            // Test-harness switch, not a setting.
            if key == "REQUIRE_SOCKET_TESTS" {
                continue;
            }
            self.set(&key.to_ascii_lowercase(), value.as_ref().trim())?;
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "api_token" => self.api_token = Some(value.to_string()),
            "rate_limit_count" => self.rate_limit_count = parse_number(key, value)?,
            "rate_limit_period_secs" => self.rate_limit_period = parse_secs(key, value)?,
            "max_retries" => self.max_retries = parse_number(key, value)?,
            "retry_delay_secs" => self.retry_delay = parse_secs(key, value)?,
            "request_timeout_secs" => self.request_timeout = parse_secs(key, value)?,
            "extractor_timeout_secs" => self.extractor_timeout = parse_secs(key, value)?,
            "max_file_size" => self.max_file_size = parse_number(key, value)?,
            "temp_dir" => self.temp_dir = PathBuf::from(value),
            "purge_interval_secs" => self.purge_interval = parse_secs(key, value)?,
            "max_concurrent_requests" => {
                let n: usize = parse_number(key, value)?;
                self.max_concurrent_requests = (n > 0).then_some(n);
            }
            "extractor_binary" => self.extractor_binary = value.to_string(),
            "pinterest_page_base" => {
                self.pinterest_page_base = value.trim_end_matches('/').to_string();
            }
            "pinterest_short_hosts" => self.pinterest_short_hosts = split_list(value),
            "caption" => self.caption = value.to_string(),
            other => {
                let platform = other
                    .strip_suffix("_domains")
                    .and_then(|name| Platform::ALL.into_iter().find(|p| p.as_str() == name));
                let Some(platform) = platform else {
                    return Err(ConfigError::UnknownKey {
                        key: other.to_string(),
                    });
                };
                let domains = split_list(value);
                match self.domains.iter_mut().find(|(p, _)| *p == platform) {
                    Some(entry) => entry.1 = domains,
                    None => self.domains.push((platform, domains)),
                }
            }
        }
        Ok(())
    }

    /// Checks ranges and domain lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for zero limits, periods, attempts
    /// or sizes and for timeouts outside `1..=3600` seconds, and
    /// [`ConfigError::Registry`] for empty or overlapping domain lists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_count == 0 {
            return Err(out_of_range("rate_limit_count", "expected at least 1"));
        }
        if self.rate_limit_period.is_zero() {
            return Err(out_of_range("rate_limit_period_secs", "expected at least 1"));
        }
        if self.max_retries == 0 {
            return Err(out_of_range("max_retries", "expected at least 1"));
        }
        if self.max_file_size == 0 {
            return Err(out_of_range("max_file_size", "expected at least 1 byte"));
        }
        if self.purge_interval.is_zero() {
            return Err(out_of_range("purge_interval_secs", "expected at least 1"));
        }
        validate_timeout("request_timeout_secs", self.request_timeout)?;
        validate_timeout("extractor_timeout_secs", self.extractor_timeout)?;
        self.registry()?;
        Ok(())
    }

    /// Builds the platform registry from the domain lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Registry`] for empty or overlapping lists.
    pub fn registry(&self) -> Result<PlatformRegistry, ConfigError> {
        Ok(PlatformRegistry::new(self.domains.iter().cloned())?)
    }

    /// Retry policy for streamed downloads.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }

    /// Engine settings derived from this config.
    #[must_use]
    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            max_file_size: self.max_file_size,
            retry_policy: self.retry_policy(),
            pinterest_page_base: self.pinterest_page_base.clone(),
            pinterest_short_hosts: self.pinterest_short_hosts.clone(),
        }
    }
}

fn out_of_range(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key,
        reason: reason.to_string(),
    }
}

fn validate_timeout(key: &'static str, value: Duration) -> Result<(), ConfigError> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&value.as_secs()) {
        return Err(out_of_range(
            key,
            &format!("{}s, expected range: 1..={MAX_TIMEOUT_SECS}", value.as_secs()),
        ));
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_number(key, value).map(Duration::from_secs)
}
