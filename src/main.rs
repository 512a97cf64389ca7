//! snapvault — dated, idempotent snapshots of personal data.
//!
//! Backs up an account's content from online platforms (Reddit, Twitter/X,
//! GitHub) into a local filesystem tree, one immutable snapshot per
//! category per date, with a JSON manifest recording what was captured.
//! Re-running for an already-committed snapshot is a no-op.

#![warn(clippy::all)]

mod cli;
mod config;
mod credentials;
mod fetch;
mod item;
mod process;
pub mod retry;
mod shutdown;
mod snapshot;
mod source;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use credentials::CredentialStore;
use fetch::ItemSource;
use snapshot::media::{AttachmentFetcher, HttpFetcher};
use snapshot::{manifest, CategoryOutcome, CategoryPaths, CategoryRun};
use source::{github::GithubClient, reddit, twitter, Platform};

/// Total deadline for API calls, and the connect/per-read timeout for the
/// media client. Media downloads carry no overall deadline: a multi-hour
/// transfer only fails if the connection stalls.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Build the category sources and the attachment fetcher for a platform.
/// Authentication happens here, so a bad credential fails the whole run
/// before anything touches disk.
async fn build_sources(
    config: &Config,
    store: &CredentialStore,
    http: reqwest::Client,
    media_http: reqwest::Client,
) -> anyhow::Result<(Vec<Box<dyn ItemSource>>, Box<dyn AttachmentFetcher>)> {
    let creds = store.bundle(config.platform.as_str());
    let mut sources: Vec<Box<dyn ItemSource>> = Vec::new();

    match config.platform {
        Platform::Reddit => {
            let client = reddit::RedditClient::login(http.clone(), &config.account, &creds).await?;
            for name in &config.categories {
                let category = reddit::RedditCategory::from_name(name)
                    .ok_or_else(|| anyhow::anyhow!("unknown reddit category '{name}'"))?;
                sources.push(Box::new(client.source(category)));
            }
            Ok((sources, Box::new(HttpFetcher::new(media_http, config.retry))))
        }
        Platform::Twitter => {
            let client =
                twitter::TwitterClient::connect(http.clone(), &config.account, &creds).await?;
            for name in &config.categories {
                let category = twitter::TwitterCategory::from_name(name)
                    .ok_or_else(|| anyhow::anyhow!("unknown twitter category '{name}'"))?;
                sources.push(Box::new(client.source(category)));
            }
            Ok((sources, Box::new(HttpFetcher::new(media_http, config.retry))))
        }
        Platform::Github => {
            let client = GithubClient::connect(http, &creds)?;
            sources.push(Box::new(client.source()));
            Ok((sources, Box::new(GithubClient::mirror_fetcher())))
        }
    }
}

async fn run_backup(args: cli::BackupArgs) -> anyhow::Result<()> {
    let config = Config::from_cli(args)?;
    tracing::info!(
        platform = %config.platform,
        account = %config.account,
        date = %config.snapshot_date,
        categories = ?config.categories,
        "Starting backup"
    );

    let store = CredentialStore::load(&config.credentials_file)?;
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;
    let media_http =
        HttpFetcher::streaming_client(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))?;
    let (sources, fetcher) = build_sources(&config, &store, http, media_http).await?;

    let shutdown_token = shutdown::install_signal_handler();
    let progress = indicatif::MultiProgress::new();

    // One run per category, each owning a disjoint subtree; they share
    // nothing mutable, so they can make progress concurrently.
    let runs: Vec<CategoryRun> = sources
        .iter()
        .map(|source| CategoryRun {
            platform: config.platform.as_str().to_string(),
            account: config.account.clone(),
            paths: CategoryPaths::new(
                &config.directory,
                config.platform.as_str(),
                &config.account,
                source.category(),
            ),
            source: source.as_ref(),
            fetcher: fetcher.as_ref(),
            snapshot_date: config.snapshot_date,
            cutoff: config.cutoff,
            limit: config.limit,
            retry_config: config.retry,
            skip_media: config.skip_media,
            dry_run: config.dry_run,
            cancel: shutdown_token.child_token(),
            progress: progress.clone(),
        })
        .collect();

    let results = futures_util::future::join_all(runs.iter().map(|run| run.run())).await;

    let mut failed = 0usize;
    let mut cancelled = 0usize;
    for (source, result) in sources.iter().zip(results) {
        let category = source.category();
        match result? {
            CategoryOutcome::Skipped => {
                println!("{category}: already backed up, skipped");
            }
            CategoryOutcome::Completed {
                item_count,
                media_downloaded,
                failed_count,
            } => {
                println!(
                    "{category}: {item_count} items, {media_downloaded} media files{}",
                    if failed_count > 0 {
                        format!(", {failed_count} failed (see manifest)")
                    } else {
                        String::new()
                    }
                );
            }
            CategoryOutcome::Failed { error } => {
                println!("{category}: FAILED - {error}");
                failed += 1;
            }
            CategoryOutcome::Cancelled => {
                println!("{category}: cancelled");
                cancelled += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} categories failed");
    }
    if cancelled > 0 {
        anyhow::bail!("backup interrupted, {cancelled} categories incomplete");
    }
    Ok(())
}

async fn run_status(args: cli::StatusArgs) -> anyhow::Result<()> {
    let directory = config::expand_tilde(&args.directory);
    let account_dir =
        snapshot::paths::account_dir(&directory, args.platform.as_str(), &args.account);

    if !account_dir.exists() {
        println!("No backups found at {}", account_dir.display());
        println!("Run a backup first.");
        return Ok(());
    }

    println!("Backups for {}/{}:", args.platform, args.account);
    println!();

    let mut categories: Vec<String> = std::fs::read_dir(&account_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    categories.sort();

    for category in categories {
        let paths = CategoryPaths::new(&directory, args.platform.as_str(), &args.account, &category);
        let manifests = manifest::list_manifests(&paths);
        println!("{category}: {} snapshot(s)", manifests.len());

        for path in manifests {
            match manifest::read_manifest(&path).await {
                Ok(m) => {
                    println!(
                        "  {}  items={} media={} failed={} ({:.1}s)",
                        m.snapshot_date,
                        m.item_count,
                        m.media_downloaded,
                        m.failed_count,
                        m.duration_seconds
                    );
                    if args.failed {
                        for failure in &m.failures {
                            println!("    {} - {}", failure.id, failure.error);
                        }
                    }
                }
                Err(e) => {
                    println!("  {} - unreadable manifest: {e}", path.display());
                }
            }
        }
        println!();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let filter = match cli.log_level {
        cli::LogLevel::Debug => "debug",
        cli::LogLevel::Info => "info",
        cli::LogLevel::Warn => "warn",
        cli::LogLevel::Error => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Command::Backup(args) => run_backup(args).await,
        Command::Status(args) => run_status(args).await,
    }
}
