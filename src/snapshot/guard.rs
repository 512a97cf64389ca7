//! Snapshot existence short-circuit.
//!
//! A snapshot counts as committed only when both the category payload and
//! the manifest are on disk; the manifest is written last, so its presence
//! means the run that produced the payload finished.

use chrono::NaiveDate;

use super::paths::CategoryPaths;

/// Read-only check used as the fast path before any fetch/write work.
pub fn snapshot_exists(paths: &CategoryPaths, date: NaiveDate) -> bool {
    paths.items_file(date).exists() && paths.manifest_file(date).exists()
}
