//! Deterministic backup tree layout.
//!
//! Every path is a pure function of (platform, account, category, date) plus
//! the item ID, so repeated runs land on the same files:
//!
//! ```text
//! <root>/<platform>/<account>/<category>/<YYYY-MM-DD>/items.json
//! <root>/<platform>/<account>/<category>/<YYYY-MM-DD>/<item_id>.json
//! <root>/<platform>/<account>/<category>/<YYYY-MM-DD>/media/<item_id>_<i>.<ext>
//! <root>/<platform>/<account>/<category>/backup_manifest_<YYYY-MM-DD>.json
//! <root>/<platform>/<account>/<category>/download_archive.txt
//! ```

use std::path::PathBuf;

use chrono::NaiveDate;

/// Root of the backup tree plus the (platform, account, category) slice a
/// single workflow exclusively owns.
#[derive(Debug, Clone)]
pub struct CategoryPaths {
    category_dir: PathBuf,
}

impl CategoryPaths {
    pub fn new(root: &std::path::Path, platform: &str, account: &str, category: &str) -> Self {
        let category_dir = root
            .join(sanitize_component(platform))
            .join(sanitize_component(account))
            .join(sanitize_component(category));
        Self { category_dir }
    }

    pub fn category_dir(&self) -> &std::path::Path {
        &self.category_dir
    }

    pub fn snapshot_dir(&self, date: NaiveDate) -> PathBuf {
        self.category_dir.join(date.format("%Y-%m-%d").to_string())
    }

    pub fn items_file(&self, date: NaiveDate) -> PathBuf {
        self.snapshot_dir(date).join("items.json")
    }

    pub fn item_file(&self, date: NaiveDate, item_id: &str) -> PathBuf {
        let mut name = sanitize_component(item_id);
        // "items" is taken by the combined payload file.
        if name == "items" {
            name.push_str("_item");
        }
        self.snapshot_dir(date).join(format!("{name}.json"))
    }

    pub fn media_dir(&self, date: NaiveDate) -> PathBuf {
        self.snapshot_dir(date).join("media")
    }

    /// Media path keyed by item ID plus attachment index, keeping multiple
    /// attachments on one item collision-free.
    pub fn media_file(&self, date: NaiveDate, item_id: &str, index: usize, ext: &str) -> PathBuf {
        self.media_dir(date)
            .join(format!("{}_{}.{}", sanitize_component(item_id), index, ext))
    }

    pub fn manifest_file(&self, date: NaiveDate) -> PathBuf {
        self.category_dir
            .join(format!("backup_manifest_{}.json", date.format("%Y-%m-%d")))
    }

    pub fn archive_file(&self) -> PathBuf {
        self.category_dir.join("download_archive.txt")
    }
}

/// Where an account's categories live. Uses the same sanitization as the
/// write path, so lookups find what a backup wrote.
pub fn account_dir(root: &std::path::Path, platform: &str, account: &str) -> PathBuf {
    root.join(sanitize_component(platform))
        .join(sanitize_component(account))
}

/// Strip characters that are invalid on common filesystems: `/`, `\`, `:`,
/// `*`, `?`, `"`, `<`, `>`, `|`. Applied to every externally-supplied path
/// component (account names, item IDs).
pub fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect()
}
