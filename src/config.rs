use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::retry::RetryConfig;
use crate::source::Platform;

/// Resolved backup run configuration.
pub struct Config {
    pub platform: Platform,
    pub account: String,
    pub categories: Vec<String>,
    pub directory: PathBuf,
    pub credentials_file: PathBuf,
    pub snapshot_date: NaiveDate,
    pub cutoff: DateTime<Utc>,
    pub limit: Option<usize>,
    pub retry: RetryConfig,
    pub skip_media: bool,
    pub dry_run: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("platform", &self.platform)
            .field("account", &self.account)
            .field("categories", &self.categories)
            .field("directory", &self.directory)
            .field("snapshot_date", &self.snapshot_date)
            .field("cutoff", &self.cutoff)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Parse a snapshot reference into (calendar date, cutoff timestamp).
///
/// Accepts a plain date (`2024-06-01`, cutoff is midnight UTC), a full
/// datetime (`2024-06-01T15:30:00`, cutoff is that instant), or a relative
/// interval in days (`20d`, meaning 20 days before now).
pub fn parse_snapshot_ref(input: &str) -> anyhow::Result<(NaiveDate, DateTime<Utc>)> {
    if let Some(days) = input
        .strip_suffix('d')
        .and_then(|n| n.parse::<i64>().ok())
    {
        let cutoff = Utc::now() - Duration::days(days);
        return Ok((cutoff.date_naive(), cutoff));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let cutoff = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid date: {input}"))?
            .and_utc();
        return Ok((date, cutoff));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        let cutoff = dt.and_utc();
        return Ok((cutoff.date_naive(), cutoff));
    }

    anyhow::bail!(
        "could not parse '{input}' as a date (2024-06-01), datetime \
         (2024-06-01T15:30:00), or interval (20d)"
    )
}

impl Config {
    pub fn from_cli(args: crate::cli::BackupArgs) -> anyhow::Result<Self> {
        let (snapshot_date, cutoff) = match args.snapshot_date.as_deref() {
            Some(raw) => parse_snapshot_ref(raw)?,
            None => {
                let now = Utc::now();
                (now.date_naive(), now)
            }
        };

        let categories = if args.categories.is_empty() {
            args.platform
                .default_categories()
                .iter()
                .map(|c| c.to_string())
                .collect()
        } else {
            for category in &args.categories {
                if !args
                    .platform
                    .default_categories()
                    .contains(&category.as_str())
                {
                    anyhow::bail!(
                        "unknown category '{category}' for {} (available: {})",
                        args.platform,
                        args.platform.default_categories().join(", ")
                    );
                }
            }
            args.categories
        };

        Ok(Self {
            platform: args.platform,
            account: args.account,
            categories,
            directory: expand_tilde(&args.directory),
            credentials_file: expand_tilde(&args.credentials_file),
            snapshot_date,
            cutoff,
            limit: args.limit,
            retry: RetryConfig {
                max_retries: args.max_retries,
                base_delay_secs: args.retry_delay,
                max_delay_secs: 60,
            },
            skip_media: args.skip_media,
            dry_run: args.dry_run,
        })
    }
}
