//! Content writer: items to disk, media through the fetcher.
//!
//! Writes the combined `items.json` payload first, then walks items one by
//! one. Item-level failures (a dead media URL, a full disk on one file) are
//! recorded and the walk continues; only the combined payload write aborts
//! the category, because without it the snapshot has no content.

use std::io::IsTerminal;

use chrono::NaiveDate;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};

use super::archive::DownloadArchive;
use super::error::{ItemFailure, WriteError};
use super::media::AttachmentFetcher;
use super::paths::CategoryPaths;
use crate::item::ContentItem;

/// Counters reported into the manifest.
#[derive(Debug, Default)]
pub struct WriteStats {
    pub item_count: u64,
    pub media_downloaded: u64,
    pub failures: Vec<ItemFailure>,
}

pub struct ContentWriter<'a> {
    paths: &'a CategoryPaths,
    fetcher: &'a dyn AttachmentFetcher,
    /// Shared across concurrently running categories so their bars stack
    /// instead of fighting over the terminal.
    progress: MultiProgress,
    skip_media: bool,
    dry_run: bool,
}

impl<'a> ContentWriter<'a> {
    pub fn new(
        paths: &'a CategoryPaths,
        fetcher: &'a dyn AttachmentFetcher,
        progress: MultiProgress,
        skip_media: bool,
        dry_run: bool,
    ) -> Self {
        Self {
            paths,
            fetcher,
            progress,
            skip_media,
            dry_run,
        }
    }

    /// Write the snapshot payload for `date`. Items must already be
    /// filtered and sorted; they are serialized in the order given.
    pub async fn write_snapshot(
        &self,
        date: NaiveDate,
        items: &[ContentItem],
        archive: &mut DownloadArchive,
    ) -> Result<WriteStats, WriteError> {
        let mut stats = WriteStats {
            item_count: items.len() as u64,
            ..Default::default()
        };

        if self.dry_run {
            let media_total: usize = items.iter().map(|i| i.attachments.len()).sum();
            info!(
                "[DRY RUN] Would write {} items ({} attachments) to {}",
                items.len(),
                media_total,
                self.paths.snapshot_dir(date).display()
            );
            return Ok(stats);
        }

        tokio::fs::create_dir_all(self.paths.snapshot_dir(date)).await?;
        self.write_items_file(date, items).await?;

        let progress = attach_progress_bar(
            &self.progress,
            items.len() as u64,
            std::io::stdout().is_terminal(),
        );
        for item in items {
            match self.write_item(date, item, archive).await {
                Ok(media_count) => stats.media_downloaded += media_count,
                Err(e) => {
                    warn!(id = %item.id, "item failed: {e}");
                    stats.failures.push(ItemFailure {
                        id: item.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(stats)
    }

    /// Combined payload: every item's metadata in one sorted-key JSON array.
    async fn write_items_file(
        &self,
        date: NaiveDate,
        items: &[ContentItem],
    ) -> Result<(), WriteError> {
        let payloads: Vec<&Value> = items.iter().map(|i| &i.payload).collect();
        let mut body = serde_json::to_string_pretty(&payloads)?;
        body.push('\n');
        tokio::fs::write(self.paths.items_file(date), body).await?;
        Ok(())
    }

    /// Media first, metadata second: an item's `<id>.json` appearing on
    /// disk means all of its attachments made it too. Returns the number of
    /// attachments downloaded.
    async fn write_item(
        &self,
        date: NaiveDate,
        item: &ContentItem,
        archive: &mut DownloadArchive,
    ) -> Result<u64, WriteError> {
        let mut downloaded = 0u64;

        if !self.skip_media && !item.attachments.is_empty() {
            if archive.contains(&item.id) {
                info!(id = %item.id, "media already archived, skipping download");
            } else {
                for (index, attachment) in item.attachments.iter().enumerate() {
                    let dest =
                        self.paths
                            .media_file(date, &item.id, index, &attachment.extension);
                    self.fetcher.fetch(&attachment.url, &dest).await?;
                    downloaded += 1;
                }
                archive.insert(&item.id);
            }
        }

        let item_path = self.paths.item_file(date, &item.id);
        // A file left by an earlier interrupted run counts as done.
        if !item_path.exists() {
            let mut body = serde_json::to_string_pretty(&item.payload)?;
            body.push('\n');
            tokio::fs::write(&item_path, body).await?;
        }

        Ok(downloaded)
    }
}

fn attach_progress_bar(multi: &MultiProgress, len: u64, interactive: bool) -> ProgressBar {
    if !interactive {
        return ProgressBar::hidden();
    }
    let bar = multi.add(ProgressBar::new(len));
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} items ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    use crate::item::Attachment;
    use indicatif::ProgressDrawTarget;

    fn test_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("snapvault_writer_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn item(id: &str, ts: i64, attachments: Vec<Attachment>) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            created_at: Utc.timestamp_opt(ts, 0).unwrap(),
            payload: json!({"id": id, "body": format!("content of {id}")}),
            attachments,
        }
    }

    fn attachment(url: &str) -> Attachment {
        Attachment::from_url(url, "jpg")
    }

    /// Writes a marker byte per fetch; fails for URLs on the deny list.
    struct FakeFetcher {
        deny: Vec<String>,
        calls: AtomicU32,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self::denying(Vec::new())
        }

        fn denying(deny: Vec<String>) -> Self {
            Self {
                deny,
                calls: AtomicU32::new(0),
                fetched: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AttachmentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<(), WriteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.deny.iter().any(|d| d == url) {
                return Err(WriteError::HttpStatus {
                    status: 500,
                    url: url.to_string(),
                });
            }
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(dest, b"m").await?;
            self.fetched.lock().await.push(url.to_string());
            Ok(())
        }
    }

    async fn load_archive(paths: &CategoryPaths) -> DownloadArchive {
        DownloadArchive::load(&paths.archive_file()).await.unwrap()
    }

    #[tokio::test]
    async fn test_writes_items_file_and_per_item_files() {
        let root = test_root("basic");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, false);
        let mut archive = load_archive(&paths).await;

        let items = vec![item("t3_a", 100, vec![]), item("t3_b", 200, vec![])];
        let stats = writer
            .write_snapshot(date(), &items, &mut archive)
            .await
            .unwrap();

        assert_eq!(stats.item_count, 2);
        assert!(stats.failures.is_empty());
        assert!(paths.items_file(date()).exists());
        assert!(paths.item_file(date(), "t3_a").exists());
        assert!(paths.item_file(date(), "t3_b").exists());

        let combined: Vec<Value> = serde_json::from_str(
            &std::fs::read_to_string(paths.items_file(date())).unwrap(),
        )
        .unwrap();
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0]["id"], "t3_a");
    }

    #[tokio::test]
    async fn test_media_downloaded_and_archived() {
        let root = test_root("media");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, false);
        let mut archive = load_archive(&paths).await;

        let items = vec![item(
            "t3_a",
            100,
            vec![
                attachment("https://i.example/one.jpg"),
                attachment("https://i.example/two.mp4"),
            ],
        )];
        let stats = writer
            .write_snapshot(date(), &items, &mut archive)
            .await
            .unwrap();

        assert_eq!(stats.media_downloaded, 2);
        assert!(paths.media_file(date(), "t3_a", 0, "jpg").exists());
        assert!(paths.media_file(date(), "t3_a", 1, "mp4").exists());
        assert!(archive.contains("t3_a"));
    }

    #[tokio::test]
    async fn test_archived_item_skips_media_refetch() {
        let root = test_root("archived");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, false);
        let mut archive = load_archive(&paths).await;
        archive.insert("t3_a");

        let items = vec![item("t3_a", 100, vec![attachment("https://i.example/x.jpg")])];
        let stats = writer
            .write_snapshot(date(), &items, &mut archive)
            .await
            .unwrap();

        assert_eq!(stats.media_downloaded, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        // Metadata is still written even when media is skipped.
        assert!(paths.item_file(date(), "t3_a").exists());
    }

    #[tokio::test]
    async fn test_failed_item_recorded_and_rest_continue() {
        let root = test_root("partial_failure");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let bad_url = "https://i.example/3.jpg".to_string();
        let fetcher = FakeFetcher::denying(vec![bad_url.clone()]);
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, false);
        let mut archive = load_archive(&paths).await;

        let items = vec![
            item("t3_1", 100, vec![attachment("https://i.example/1.jpg")]),
            item("t3_2", 200, vec![]),
            item("t3_3", 300, vec![attachment(&bad_url)]),
            item("t3_4", 400, vec![attachment("https://i.example/4.jpg")]),
            item("t3_5", 500, vec![]),
        ];
        let stats = writer
            .write_snapshot(date(), &items, &mut archive)
            .await
            .unwrap();

        assert_eq!(stats.item_count, 5);
        assert_eq!(stats.media_downloaded, 2);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].id, "t3_3");

        // The failed item gets no metadata file and no archive entry; the
        // other four are all on disk.
        assert!(!paths.item_file(date(), "t3_3").exists());
        assert!(!archive.contains("t3_3"));
        for id in ["t3_1", "t3_2", "t3_4", "t3_5"] {
            assert!(paths.item_file(date(), id).exists(), "{id} missing");
        }
        // items.json still embeds all five.
        let combined: Vec<Value> = serde_json::from_str(
            &std::fs::read_to_string(paths.items_file(date())).unwrap(),
        )
        .unwrap();
        assert_eq!(combined.len(), 5);
    }

    #[tokio::test]
    async fn test_skip_media_writes_metadata_only() {
        let root = test_root("skip_media");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), true, false);
        let mut archive = load_archive(&paths).await;

        let items = vec![item("t3_a", 100, vec![attachment("https://i.example/x.jpg")])];
        let stats = writer
            .write_snapshot(date(), &items, &mut archive)
            .await
            .unwrap();

        assert_eq!(stats.media_downloaded, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(paths.item_file(date(), "t3_a").exists());
        assert!(!archive.contains("t3_a"));
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let root = test_root("dry_run");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, true);
        let mut archive = load_archive(&paths).await;

        let items = vec![item("t3_a", 100, vec![attachment("https://i.example/x.jpg")])];
        let stats = writer
            .write_snapshot(date(), &items, &mut archive)
            .await
            .unwrap();

        assert_eq!(stats.item_count, 1);
        assert!(!paths.snapshot_dir(date()).exists());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_item_file_not_rewritten() {
        let root = test_root("existing_item");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        std::fs::create_dir_all(paths.snapshot_dir(date())).unwrap();
        std::fs::write(paths.item_file(date(), "t3_a"), b"{\"stale\": true}").unwrap();

        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, false);
        let mut archive = load_archive(&paths).await;
        writer
            .write_snapshot(date(), &[item("t3_a", 100, vec![])], &mut archive)
            .await
            .unwrap();

        let contents = std::fs::read_to_string(paths.item_file(date(), "t3_a")).unwrap();
        assert_eq!(contents, "{\"stale\": true}");
    }

    #[tokio::test]
    async fn test_item_named_items_gets_its_own_file() {
        let root = test_root("reserved_id");
        let paths = CategoryPaths::new(&root, "reddit", "alice", "saved");
        let fetcher = FakeFetcher::new();
        let writer = ContentWriter::new(&paths, &fetcher, MultiProgress::new(), false, false);
        let mut archive = load_archive(&paths).await;

        writer
            .write_snapshot(date(), &[item("items", 100, vec![])], &mut archive)
            .await
            .unwrap();

        // The combined payload is an array; the per-item file is not
        // swallowed by it.
        let combined: Vec<Value> = serde_json::from_str(
            &std::fs::read_to_string(paths.items_file(date())).unwrap(),
        )
        .unwrap();
        assert_eq!(combined.len(), 1);

        let per_item: Value = serde_json::from_str(
            &std::fs::read_to_string(paths.item_file(date(), "items")).unwrap(),
        )
        .unwrap();
        assert_eq!(per_item["id"], "items");
    }

    #[test]
    fn test_progress_bar_hidden_when_not_interactive() {
        let multi = MultiProgress::new();
        let bar = attach_progress_bar(&multi, 5, false);
        assert!(bar.is_hidden());
    }

    #[test]
    fn test_progress_bar_joins_shared_set_when_interactive() {
        // `MultiProgress::new()` targets stderr, which is not a terminal
        // under `cargo test`, so indicatif would hide the bar regardless
        // of the interactive flag. Draw to an in-memory terminal instead.
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::term_like(Box::new(
            indicatif::InMemoryTerm::new(10, 80),
        )));
        let bar = attach_progress_bar(&multi, 5, true);
        assert!(!bar.is_hidden());
        assert_eq!(bar.length(), Some(5));
    }
}
