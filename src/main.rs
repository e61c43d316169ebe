//! Console entry point for the media bot.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mediabot_core::config::default_config_path;
use mediabot_core::{
    Config, DirectorySink, Dispatcher, HttpClient, MediaDownloader, Outcome, RateLimiter,
    StorageManager, UserId, YtDlpExtractor,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// One printed result line.
#[derive(Serialize)]
struct OutcomeLine<'a> {
    user_id: UserId,
    url: &'a str,
    #[serde(flatten)]
    outcome: &'a Outcome,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = load_config(&args)?;
    debug!(?config, "configuration resolved");

    let storage = StorageManager::new(&config.temp_dir);
    storage
        .ensure_root()
        .await
        .context("failed to create scratch directory")?;
    let purge = storage.spawn_purge_task(config.purge_interval);

    let http = HttpClient::with_timeout(config.request_timeout)
        .context("failed to build HTTP client")?;
    let extractor = YtDlpExtractor::new(&config.extractor_binary, config.extractor_timeout);
    let downloader = MediaDownloader::new(
        config.registry()?,
        http,
        Arc::new(extractor),
        config.download_settings(),
    );
    let limiter = RateLimiter::new(config.rate_limit_count, config.rate_limit_period);
    let mut dispatcher = Dispatcher::new(
        Arc::new(limiter),
        storage,
        Arc::new(downloader),
        Arc::new(DirectorySink::new(&args.output_dir)),
    )
    .with_caption(&config.caption);
    if let Some(max) = config.max_concurrent_requests {
        dispatcher = dispatcher.with_concurrency_limit(max);
    }

    info!(temp_dir = %config.temp_dir.display(), output_dir = %args.output_dir.display(), "mediabot starting");

    let mut pending = Vec::new();
    if args.urls.is_empty() {
        if io::stdin().is_terminal() {
            info!("No input provided. Pipe `<user_id> <url>` lines via stdin or pass URLs as arguments.");
            info!("Example: echo '42 https://www.instagram.com/p/ABC123/' | mediabot");
        }
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let Some((user_id, url)) = parse_line(&line) else {
                if !line.trim().is_empty() {
                    warn!(line = %line, "skipped line: expected `<user_id> <url>`");
                }
                continue;
            };
            let submission = dispatcher.submit(user_id, url).await;
            pending.push((user_id, url.to_string(), submission));
        }
    } else {
        for url in &args.urls {
            let submission = dispatcher.submit(args.user, url).await;
            pending.push((args.user, url.clone(), submission));
        }
    }

    let mut delivered = 0usize;
    let total = pending.len();
    for (user_id, url, submission) in pending {
        let outcome = submission.outcome().await;
        if outcome.is_success() {
            delivered += 1;
        }
        let line = OutcomeLine {
            user_id,
            url: &url,
            outcome: &outcome,
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    purge.abort();
    info!(delivered, failed = total - delivered, total, "mediabot finished");
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::default();
    match &args.config {
        Some(path) => config.apply_file(path)?,
        None => {
            if let Some(path) = default_config_path()
                && path.exists()
            {
                config.apply_file(&path)?;
            }
        }
    }
    config.apply_env()?;
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

/// Splits `<user_id> <url>`.
fn parse_line(line: &str) -> Option<(UserId, &str)> {
    let (user, rest) = line.trim().split_once(char::is_whitespace)?;
    let user_id = user.parse().ok()?;
    Some((user_id, rest.trim()))
}
