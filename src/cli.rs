use clap::{Args, Parser, Subcommand};

use crate::source::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Parser, Debug)]
#[command(
    name = "snapvault",
    about = "Dated, idempotent snapshots of personal data from online platforms"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Back up one platform account for a snapshot date
    Backup(BackupArgs),
    /// Show committed snapshots for an account
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Platform to back up
    #[arg(long, value_enum)]
    pub platform: Platform,

    /// Account name on the platform
    #[arg(short = 'a', long)]
    pub account: String,

    /// Snapshot date (2024-06-01), cutoff datetime (2024-06-01T15:30:00),
    /// or interval (20d). Defaults to now.
    #[arg(long)]
    pub snapshot_date: Option<String>,

    /// Category to back up (repeatable; defaults to all for the platform)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Maximum items per category
    #[arg(long)]
    pub limit: Option<usize>,

    /// Root directory of the backup tree
    #[arg(short = 'd', long, env = "SNAPVAULT_DIRECTORY", default_value = "~/backups")]
    pub directory: String,

    /// Credentials file (JSON keyed by platform)
    #[arg(
        long,
        env = "SNAPVAULT_CREDENTIALS_FILE",
        default_value = "~/.snapvault/credentials.json"
    )]
    pub credentials_file: String,

    /// Skip media attachment downloads
    #[arg(long)]
    pub skip_media: bool,

    /// Fetch and report, but write nothing to disk
    #[arg(long)]
    pub dry_run: bool,

    /// Retries for transient API failures
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base retry delay in seconds
    #[arg(long, default_value_t = 2)]
    pub retry_delay: u64,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Platform to inspect
    #[arg(long, value_enum)]
    pub platform: Platform,

    /// Account name on the platform
    #[arg(short = 'a', long)]
    pub account: String,

    /// Root directory of the backup tree
    #[arg(short = 'd', long, env = "SNAPVAULT_DIRECTORY", default_value = "~/backups")]
    pub directory: String,

    /// Also list per-item failures recorded in each manifest
    #[arg(long)]
    pub failed: bool,
}
