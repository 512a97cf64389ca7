//! Fingerprint store for already-downloaded media.
//!
//! One item ID per line in `download_archive.txt`, kept sorted on save so
//! the file is byte-stable across runs. The set is append-only: IDs are
//! never removed by the backup itself.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

#[derive(Debug)]
pub struct DownloadArchive {
    path: PathBuf,
    ids: BTreeSet<String>,
    dirty: bool,
}

impl DownloadArchive {
    /// Load the archive, treating a missing file as an empty set.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let ids = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_path_buf(),
            ids,
            dirty: false,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an ID; returns false if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        let inserted = self.ids.insert(id.to_string());
        self.dirty |= inserted;
        inserted
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Persist the set, one sorted ID per line. No-op when nothing changed,
    /// so an idempotent re-run leaves the file untouched.
    pub async fn save(&mut self) -> std::io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut contents = String::with_capacity(self.ids.len() * 16);
        for id in &self.ids {
            contents.push_str(id);
            contents.push('\n');
        }
        let mut file = tokio::fs::File::create(&self.path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("snapvault_archive_tests");
        fs::create_dir_all(&dir).unwrap();
        let p = dir.join(name);
        let _ = fs::remove_file(&p);
        p
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let path = test_file("missing.txt");
        let archive = DownloadArchive::load(&path).await.unwrap();
        assert_eq!(archive.len(), 0);
        assert!(!archive.contains("t3_abc"));
    }

    #[tokio::test]
    async fn test_insert_and_contains() {
        let path = test_file("insert.txt");
        let mut archive = DownloadArchive::load(&path).await.unwrap();
        assert!(archive.insert("t3_abc"));
        assert!(!archive.insert("t3_abc"));
        assert!(archive.contains("t3_abc"));
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let path = test_file("round_trip.txt");
        let mut archive = DownloadArchive::load(&path).await.unwrap();
        archive.insert("t3_zzz");
        archive.insert("t3_aaa");
        archive.save().await.unwrap();

        let reloaded = DownloadArchive::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("t3_zzz"));
        assert!(reloaded.contains("t3_aaa"));
    }

    #[tokio::test]
    async fn test_save_writes_sorted_lines() {
        let path = test_file("sorted.txt");
        let mut archive = DownloadArchive::load(&path).await.unwrap();
        archive.insert("t3_c");
        archive.insert("t3_a");
        archive.insert("t3_b");
        archive.save().await.unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "t3_a\nt3_b\nt3_c\n");
    }

    #[tokio::test]
    async fn test_save_is_noop_when_clean() {
        let path = test_file("clean.txt");
        let mut archive = DownloadArchive::load(&path).await.unwrap();
        archive.insert("t3_a");
        archive.save().await.unwrap();
        let mtime1 = fs::metadata(&path).unwrap().modified().unwrap();

        // Reload, touch nothing, save again: file must not be rewritten.
        let mut reloaded = DownloadArchive::load(&path).await.unwrap();
        reloaded.save().await.unwrap();
        let mtime2 = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime1, mtime2);
    }

    #[tokio::test]
    async fn test_load_skips_blank_lines() {
        let path = test_file("blanks.txt");
        fs::write(&path, "t3_a\n\n  \nt3_b\n").unwrap();
        let archive = DownloadArchive::load(&path).await.unwrap();
        assert_eq!(archive.len(), 2);
    }
}
