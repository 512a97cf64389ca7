//! Per-category orchestration.
//!
//! One [`CategoryRun`] owns a disjoint subtree of the backup root and walks
//! the snapshot protocol as a small state machine. Fetch failures after
//! retries fail the category; write failures are per-item and recorded in
//! the manifest instead. Disk errors on the combined payload or the
//! manifest itself propagate as hard errors.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use indicatif::MultiProgress;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::archive::DownloadArchive;
use super::guard;
use super::manifest::{self, Manifest};
use super::media::AttachmentFetcher;
use super::paths::CategoryPaths;
use super::writer::ContentWriter;
use crate::fetch::{self, ItemSource};
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryState {
    NotStarted,
    CheckingGuard,
    Fetching,
    Writing,
    Manifesting,
    Done,
    Failed,
}

impl CategoryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryState::NotStarted => "not_started",
            CategoryState::CheckingGuard => "checking_guard",
            CategoryState::Fetching => "fetching",
            CategoryState::Writing => "writing",
            CategoryState::Manifesting => "manifesting",
            CategoryState::Done => "done",
            CategoryState::Failed => "failed",
        }
    }

    /// Legal transitions. `Failed` is reachable only from `Fetching`;
    /// `CheckingGuard` can jump straight to `Done` on the skip path.
    pub fn can_transition(self, to: CategoryState) -> bool {
        use CategoryState::*;
        matches!(
            (self, to),
            (NotStarted, CheckingGuard)
                | (CheckingGuard, Fetching)
                | (CheckingGuard, Done)
                | (Fetching, Writing)
                | (Fetching, Failed)
                | (Writing, Manifesting)
                | (Manifesting, Done)
        )
    }
}

/// Terminal result of one category's run.
#[derive(Debug)]
pub enum CategoryOutcome {
    /// The snapshot was already committed; nothing was touched.
    Skipped,
    Completed {
        item_count: u64,
        media_downloaded: u64,
        failed_count: u64,
    },
    /// Unrecoverable fetch error after retries.
    Failed { error: String },
    /// Shutdown requested before the category finished.
    Cancelled,
}

/// Everything one category needs: where to write, what to fetch, and the
/// run parameters. No shared mutable state with sibling categories.
pub struct CategoryRun<'a> {
    pub platform: String,
    pub account: String,
    pub paths: CategoryPaths,
    pub source: &'a dyn ItemSource,
    pub fetcher: &'a dyn AttachmentFetcher,
    pub snapshot_date: NaiveDate,
    pub cutoff: DateTime<Utc>,
    pub limit: Option<usize>,
    pub retry_config: RetryConfig,
    pub skip_media: bool,
    pub dry_run: bool,
    pub cancel: CancellationToken,
    /// Shared with sibling category runs so progress bars stack.
    pub progress: MultiProgress,
}

impl CategoryRun<'_> {
    fn advance(&self, state: &mut CategoryState, to: CategoryState) {
        debug_assert!(state.can_transition(to), "{} -> {}", state.as_str(), to.as_str());
        debug!(
            category = self.source.category(),
            from = state.as_str(),
            to = to.as_str(),
            "state transition"
        );
        *state = to;
    }

    pub async fn run(&self) -> anyhow::Result<CategoryOutcome> {
        let category = self.source.category();
        let started = Instant::now();
        let mut state = CategoryState::NotStarted;

        self.advance(&mut state, CategoryState::CheckingGuard);
        if guard::snapshot_exists(&self.paths, self.snapshot_date) {
            info!(
                platform = %self.platform,
                account = %self.account,
                category,
                date = %self.snapshot_date,
                "snapshot already exists, skipping"
            );
            self.advance(&mut state, CategoryState::Done);
            return Ok(CategoryOutcome::Skipped);
        }

        if self.cancel.is_cancelled() {
            return Ok(CategoryOutcome::Cancelled);
        }

        self.advance(&mut state, CategoryState::Fetching);
        let items = match fetch::fetch_all(self.source, self.cutoff, self.limit, &self.retry_config)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(category, "fetch failed: {e}");
                self.advance(&mut state, CategoryState::Failed);
                return Ok(CategoryOutcome::Failed {
                    error: e.to_string(),
                });
            }
        };
        info!(category, count = items.len(), "fetched items");

        if self.cancel.is_cancelled() {
            return Ok(CategoryOutcome::Cancelled);
        }

        self.advance(&mut state, CategoryState::Writing);
        let mut archive = DownloadArchive::load(&self.paths.archive_file()).await?;
        let writer = ContentWriter::new(
            &self.paths,
            self.fetcher,
            self.progress.clone(),
            self.skip_media,
            self.dry_run,
        );
        let stats = writer
            .write_snapshot(self.snapshot_date, &items, &mut archive)
            .await?;
        if !self.dry_run {
            archive.save().await?;
            debug!(category, archived = archive.len(), "archive saved");
        }

        self.advance(&mut state, CategoryState::Manifesting);
        let outcome = CategoryOutcome::Completed {
            item_count: stats.item_count,
            media_downloaded: stats.media_downloaded,
            failed_count: stats.failures.len() as u64,
        };
        if self.dry_run {
            info!(category, "[DRY RUN] Would write manifest");
        } else {
            let manifest = Manifest {
                platform: self.platform.clone(),
                account: self.account.clone(),
                category: category.to_string(),
                snapshot_date: self.snapshot_date.format("%Y-%m-%d").to_string(),
                snapshot_cutoff: self.cutoff,
                execution_timestamp: Utc::now(),
                item_count: stats.item_count,
                media_downloaded: stats.media_downloaded,
                failed_count: stats.failures.len() as u64,
                failures: stats.failures,
                duration_seconds: started.elapsed().as_secs_f64(),
                items_file: "items.json".to_string(),
            };
            let path = manifest::write_manifest(&self.paths, self.snapshot_date, &manifest).await?;
            info!(category, manifest = %path.display(), "manifest written");
        }

        self.advance(&mut state, CategoryState::Done);
        Ok(outcome)
    }
}
