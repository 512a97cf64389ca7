//! Platform source adapters.
//!
//! Each platform exposes its categories as [`ItemSource`] implementations
//! and picks the fetcher its attachments need (plain HTTP for media URLs,
//! `git` for repository mirroring). Raw API records are parsed into typed
//! items at this boundary; anything malformed is a parse error, not a
//! half-filled item.

pub mod github;
pub mod reddit;
pub mod twitter;

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

use crate::fetch::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Platform {
    Reddit,
    Twitter,
    Github,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Twitter => "twitter",
            Platform::Github => "github",
        }
    }

    /// Categories backed up when none are named on the command line.
    pub fn default_categories(&self) -> &'static [&'static str] {
        match self {
            Platform::Reddit => &["saved", "comments", "upvoted"],
            Platform::Twitter => &["tweets", "bookmarks", "likes"],
            Platform::Github => &["repositories"],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send a request and decode the JSON body, mapping HTTP failures onto the
/// fetch error taxonomy. 429 carries the server's `Retry-After` when
/// present; 401/403 are auth failures and abort the category.
pub(crate) async fn send_json(req: RequestBuilder, endpoint: &str) -> Result<Value, FetchError> {
    let response = req.send().await.map_err(|e| FetchError::Http {
        endpoint: endpoint.to_string(),
        source: e,
    })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(FetchError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after,
        });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Auth(format!("{status} from {endpoint}")));
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        });
    }

    response.json().await.map_err(|e| FetchError::Http {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::Reddit.as_str(), "reddit");
        assert_eq!(Platform::Twitter.as_str(), "twitter");
        assert_eq!(Platform::Github.as_str(), "github");
    }

    #[test]
    fn test_default_categories_nonempty() {
        for p in [Platform::Reddit, Platform::Twitter, Platform::Github] {
            assert!(!p.default_categories().is_empty());
        }
    }
}
