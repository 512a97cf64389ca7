//! Content item model shared by all platform sources.
//!
//! Sources parse raw API responses into [`ContentItem`] records at the
//! boundary; anything missing a stable ID or a usable timestamp is rejected
//! with a [`ParseError`] instead of flowing through half-typed.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

/// Parse failure for a single raw API record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a valid timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// A platform-native record with a stable unique ID.
///
/// `payload` holds the structured metadata exactly as it will be serialized
/// into the snapshot; `created_at` is extracted up front because the
/// temporal filter and the sort order depend on it.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
    pub attachments: Vec<Attachment>,
}

impl ContentItem {
    /// Composite sort key: chronological first, ID as tiebreaker, so two
    /// runs over unchanged remote data produce byte-identical ordering.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, &self.id)
    }
}

/// A binary attachment to download alongside the item's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Direct download URL, or a tool-specific locator for sources that
    /// fetch through an external process (e.g. a git remote URL).
    pub url: String,
    /// Filename extension without the dot (`jpg`, `mp4`, ...).
    pub extension: String,
}

impl Attachment {
    /// Build an attachment, deriving the extension from the URL path and
    /// falling back to `fallback_ext` when the path has none.
    pub fn from_url(url: &str, fallback_ext: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url);
        let extension = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5)
            .unwrap_or_else(|| fallback_ext.to_string());
        Self {
            url: url.to_string(),
            extension,
        }
    }
}

/// Extract a required string field from a raw JSON record.
pub fn require_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, ParseError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField(field))
}

/// Parse an RFC 3339 timestamp field (`2024-06-01T12:00:00Z` or `+00:00`
/// offsets), normalized to UTC.
pub fn parse_rfc3339_utc(raw: &str, field: &'static str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}

/// Parse a Unix-epoch seconds field (Reddit's `created_utc` style, which
/// arrives as a float).
pub fn parse_epoch_secs(secs: f64, field: &'static str) -> Result<DateTime<Utc>, ParseError> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .ok_or(ParseError::InvalidTimestamp {
            field,
            value: secs.to_string(),
        })
}
