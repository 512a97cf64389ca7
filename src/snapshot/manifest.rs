//! Backup manifest: the record that commits a snapshot.
//!
//! Written once, after all items in a category are processed. JSON keys are
//! emitted in sorted order (`serde_json`'s default `Map` is a `BTreeMap`),
//! so identical inputs produce byte-identical files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::ItemFailure;
use super::paths::CategoryPaths;

/// Fixed manifest schema, one per (account, snapshot date, category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub platform: String,
    pub account: String,
    pub category: String,
    /// Snapshot calendar date, `YYYY-MM-DD`.
    pub snapshot_date: String,
    /// The exact UTC cutoff applied by the temporal filter.
    pub snapshot_cutoff: DateTime<Utc>,
    /// Wall-clock time the run executed (informational; differs per run,
    /// but committed snapshots are never rewritten).
    pub execution_timestamp: DateTime<Utc>,
    pub item_count: u64,
    pub media_downloaded: u64,
    pub failed_count: u64,
    pub failures: Vec<ItemFailure>,
    pub duration_seconds: f64,
    pub items_file: String,
}

/// Serialize with sorted keys and write to the category's manifest path.
/// Returns the path written.
pub async fn write_manifest(
    paths: &CategoryPaths,
    date: NaiveDate,
    manifest: &Manifest,
) -> anyhow::Result<PathBuf> {
    let path = paths.manifest_file(date);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Round-trip through Value: the default Map sorts keys, independent of
    // struct field declaration order.
    let value = serde_json::to_value(manifest)?;
    let mut body = serde_json::to_string_pretty(&value)?;
    body.push('\n');
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Read a manifest back (used by `status`).
pub async fn read_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

/// List manifest files in a category directory, sorted by filename (and
/// therefore by snapshot date).
pub fn list_manifests(paths: &CategoryPaths) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = match std::fs::read_dir(paths.category_dir()) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("backup_manifest_") && n.ends_with(".json"))
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    found.sort();
    found
}
