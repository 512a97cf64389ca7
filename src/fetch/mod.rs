//! Paginated fetching from platform APIs.
//!
//! A source implements [`ItemSource`] (one instance per category); the
//! driver in [`fetch_all`] walks the cursor chain sequentially, retries
//! transient failures per page, re-applies the temporal filter client-side,
//! and returns items in a stable sorted order. A fetch is restartable from
//! scratch, never resumable mid-page.

pub mod filter;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::item::{ContentItem, ParseError};
use crate::retry::{self, RetryAction, RetryConfig};

/// One page of results plus the cursor for the next, if any.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<ContentItem>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited by {endpoint}")]
    RateLimited {
        endpoint: String,
        /// Server-specified wait, when the response carried one.
        retry_after: Option<Duration>,
    },

    #[error("HTTP error {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("bad record from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: ParseError,
    },

    #[error("retries exhausted after {retries} retries fetching {endpoint}: {last_error}")]
    RetriesExhausted {
        retries: u32,
        endpoint: String,
        last_error: String,
    },
}

impl FetchError {
    /// Retry decision for the backoff loop. Rate limits honor the server's
    /// interval when one was given; auth and parse failures abort at once.
    pub fn retry_action(&self) -> RetryAction {
        match self {
            FetchError::RateLimited {
                retry_after: Some(wait),
                ..
            } => RetryAction::RetryAfter(*wait),
            FetchError::RateLimited { .. } => RetryAction::Retry,
            FetchError::Status { status, .. } if *status >= 500 => RetryAction::Retry,
            FetchError::Http { .. } => RetryAction::Retry,
            _ => RetryAction::Abort,
        }
    }
}

/// A single platform category's paginated item stream.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Category name; doubles as the directory component under the account.
    fn category(&self) -> &str;

    /// Whether the API accepts the cutoff server-side. Purely an
    /// optimization hint: the client-side filter runs either way.
    fn supports_cutoff(&self) -> bool {
        false
    }

    /// Fetch one page. `cursor` is `None` for the first page.
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Page, FetchError>;
}

/// Walk all pages of `source`, returning items at or before `cutoff`,
/// deduplicated by ID and sorted by (timestamp, ID).
///
/// `limit` bounds the number of items collected; pagination stops early
/// once it is reached.
pub async fn fetch_all(
    source: &dyn ItemSource,
    cutoff: DateTime<Utc>,
    limit: Option<usize>,
    retry_config: &RetryConfig,
) -> Result<Vec<ContentItem>, FetchError> {
    let mut collected: Vec<ContentItem> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page_num = 0usize;

    loop {
        let cursor_ref = cursor.as_deref();
        let page = retry::retry_with_backoff(
            retry_config,
            FetchError::retry_action,
            || source.fetch_page(cursor_ref, cutoff),
        )
        .await
        .map_err(|e| match e.retry_action() {
            RetryAction::Abort => e,
            _ => FetchError::RetriesExhausted {
                retries: retry_config.max_retries,
                endpoint: source.category().to_string(),
                last_error: e.to_string(),
            },
        })?;

        page_num += 1;
        let fetched = page.items.len();
        let mut items = page.items;
        filter::apply(&mut items, cutoff);
        debug!(
            category = source.category(),
            page = page_num,
            fetched,
            kept = items.len(),
            "fetched page"
        );
        collected.extend(items);

        if let Some(max) = limit {
            if collected.len() >= max {
                break;
            }
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    collected.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    collected.dedup_by(|a, b| a.id == b.id);
    if let Some(max) = limit {
        collected.truncate(max);
    }
    Ok(collected)
}
