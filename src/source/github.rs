//! GitHub repository backup.
//!
//! Lists the authenticated user's repositories page by page, then mirrors
//! each one with `git clone --mirror` through the external-tool fetcher.
//! The REST listing has no cutoff parameter; filtering is client-side on
//! the repo creation time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::send_json;
use crate::credentials::Credentials;
use crate::fetch::{FetchError, ItemSource, Page};
use crate::item::{parse_rfc3339_utc, require_str, Attachment, ContentItem, ParseError};
use crate::process::ExternalTool;
use crate::snapshot::media::ToolFetcher;

const API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: u32 = 100;
const USER_AGENT: &str = concat!("snapvault/", env!("CARGO_PKG_VERSION"));

/// Clones can take a while on large repos.
const GIT_TIMEOUT: Duration = Duration::from_secs(3600);

pub struct GithubClient {
    http: reqwest::Client,
    token: String,
}

impl GithubClient {
    pub fn connect(http: reqwest::Client, creds: &Credentials) -> anyhow::Result<Arc<Self>> {
        let token = creds.require("token")?.to_string();
        Ok(Arc::new(Self { http, token }))
    }

    pub fn source(self: &Arc<Self>) -> GithubSource {
        GithubSource {
            client: Arc::clone(self),
        }
    }

    /// The fetcher repositories are "downloaded" with: a bare mirror clone
    /// into the media path.
    pub fn mirror_fetcher() -> ToolFetcher {
        ToolFetcher::new(
            ExternalTool::new("git", GIT_TIMEOUT),
            vec!["clone".to_string(), "--mirror".to_string()],
        )
    }
}

pub struct GithubSource {
    client: Arc<GithubClient>,
}

#[async_trait]
impl ItemSource for GithubSource {
    fn category(&self) -> &str {
        "repositories"
    }

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        _cutoff: DateTime<Utc>,
    ) -> Result<Page, FetchError> {
        let page_num: u32 = cursor.and_then(|c| c.parse().ok()).unwrap_or(1);
        let endpoint = format!("{API_BASE}/user/repos");
        let req = self
            .client
            .http
            .get(&endpoint)
            .bearer_auth(&self.client.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page_num.to_string()),
                ("affiliation", "owner".to_string()),
            ]);
        let body = send_json(req, &endpoint).await?;

        parse_repo_page(&body, page_num).map_err(|source| FetchError::Parse {
            endpoint,
            source,
        })
    }
}

/// Page-number pagination: a full page means there may be another.
pub(crate) fn parse_repo_page(body: &Value, page_num: u32) -> Result<Page, ParseError> {
    let repos = body
        .as_array()
        .ok_or(ParseError::MissingField("repository array"))?;

    let mut items = Vec::with_capacity(repos.len());
    for repo in repos {
        items.push(parse_repo(repo)?);
    }

    let next_cursor = if repos.len() as u32 == PAGE_SIZE {
        Some((page_num + 1).to_string())
    } else {
        None
    };
    Ok(Page { items, next_cursor })
}

pub(crate) fn parse_repo(repo: &Value) -> Result<ContentItem, ParseError> {
    let id = require_str(repo, "name")?.to_string();
    let created_at = parse_rfc3339_utc(require_str(repo, "created_at")?, "created_at")?;
    let clone_url = require_str(repo, "clone_url")?;

    Ok(ContentItem {
        id,
        created_at,
        payload: repo.clone(),
        attachments: vec![Attachment {
            url: clone_url.to_string(),
            extension: "git".to_string(),
        }],
    })
}
