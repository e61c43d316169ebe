//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use mediabot_core::Config;

/// Console front end for the media bot.
///
/// Reads `<user_id> <url>` lines from stdin (or takes URLs as arguments for
/// `--user`), runs each through admission, download and delivery, and prints
/// one JSON outcome per line. Delivered files are copied into `--output-dir`.
#[derive(Parser, Debug)]
#[command(name = "mediabot")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/mediabot/config.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Scratch directory for in-flight downloads
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Directory delivered files are copied into
    #[arg(short = 'o', long, default_value = "delivered")]
    pub output_dir: PathBuf,

    /// Requests admitted per user within the rate period
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub rate_limit: Option<u64>,

    /// Rate limit window in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=86400))]
    pub rate_period: Option<u64>,

    /// Attempts per streamed download (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,

    /// Largest accepted file in bytes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_file_size: Option<u64>,

    /// Maximum requests downloading at once (unbounded when omitted)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub concurrency: Option<u64>,

    /// Extraction tool executable
    #[arg(long)]
    pub extractor: Option<String>,

    /// User id for URLs given as arguments
    #[arg(short, long, default_value_t = 0)]
    pub user: i64,

    /// URLs to fetch for `--user` (stdin is read when none are given)
    pub urls: Vec<String>,
}

impl Args {
    /// Applies flag overrides on top of `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.temp_dir {
            config.temp_dir.clone_from(dir);
        }
        if let Some(limit) = self.rate_limit {
            config.rate_limit_count = usize::try_from(limit).unwrap_or(usize::MAX);
        }
        if let Some(secs) = self.rate_period {
            config.rate_limit_period = Duration::from_secs(secs);
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(size) = self.max_file_size {
            config.max_file_size = size;
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent_requests = usize::try_from(n).ok();
        }
        if let Some(program) = &self.extractor {
            config.extractor_binary.clone_from(program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["mediabot"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.output_dir, PathBuf::from("delivered"));
        assert_eq!(args.user, 0);
        assert!(args.urls.is_empty());
        assert!(args.rate_limit.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["mediabot", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["mediabot", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["mediabot", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_rejects_zero_rate_limit() {
        assert!(Args::try_parse_from(["mediabot", "--rate-limit", "0"]).is_err());
        assert!(Args::try_parse_from(["mediabot", "-r", "0"]).is_err());
        assert!(Args::try_parse_from(["mediabot", "-c", "0"]).is_err());
    }

    #[test]
    fn test_cli_positional_urls_with_user() {
        let args = Args::try_parse_from([
            "mediabot",
            "--user",
            "42",
            "https://www.instagram.com/p/A/",
            "https://pin.it/xyz",
        ])
        .unwrap();
        assert_eq!(args.user, 42);
        assert_eq!(args.urls.len(), 2);
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "mediabot",
            "--temp-dir",
            "/tmp/scratch",
            "-l",
            "2",
            "--rate-period",
            "10",
            "-r",
            "1",
            "-c",
            "4",
            "--extractor",
            "/opt/yt-dlp",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(config.rate_limit_count, 2);
        assert_eq!(config.rate_limit_period, Duration::from_secs(10));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.max_concurrent_requests, Some(4));
        assert_eq!(config.extractor_binary, "/opt/yt-dlp");
        config.validate().unwrap();
    }
}
