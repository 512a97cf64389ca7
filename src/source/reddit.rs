//! Reddit listings: saved posts, own comments, upvoted content.
//!
//! Uses the script-app OAuth password grant, then pages through
//! `/user/<name>/<listing>` with the `after` fullname cursor. The listing
//! endpoints have no server-side cutoff parameter, so the temporal filter
//! runs entirely client-side.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::send_json;
use crate::credentials::Credentials;
use crate::fetch::{FetchError, ItemSource, Page};
use crate::item::{parse_epoch_secs, require_str, Attachment, ContentItem, ParseError};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const PAGE_SIZE: u32 = 100;
const DEFAULT_USER_AGENT: &str = concat!("snapvault/", env!("CARGO_PKG_VERSION"));

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedditCategory {
    Saved,
    Comments,
    Upvoted,
}

impl RedditCategory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "saved" => Some(RedditCategory::Saved),
            "comments" => Some(RedditCategory::Comments),
            "upvoted" => Some(RedditCategory::Upvoted),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RedditCategory::Saved => "saved",
            RedditCategory::Comments => "comments",
            RedditCategory::Upvoted => "upvoted",
        }
    }
}

/// Authenticated API handle shared by this account's category sources.
pub struct RedditClient {
    http: reqwest::Client,
    access_token: String,
    user_agent: String,
    username: String,
}

impl RedditClient {
    /// Perform the password grant. Auth failure here is fatal for the
    /// whole run, so this returns at construction rather than lazily.
    pub async fn login(
        http: reqwest::Client,
        username: &str,
        creds: &Credentials,
    ) -> anyhow::Result<Arc<Self>> {
        let client_id = creds.require("client_id")?;
        let client_secret = creds.require("client_secret")?;
        let password = creds.require("password")?;
        let user_agent = creds
            .get("user_agent")
            .unwrap_or(DEFAULT_USER_AGENT)
            .to_string();

        let response = http
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .header(reqwest::header::USER_AGENT, &user_agent)
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("reddit token response had no access_token"))?
            .to_string();

        Ok(Arc::new(Self {
            http,
            access_token,
            user_agent,
            username: username.to_string(),
        }))
    }

    pub fn source(self: &Arc<Self>, category: RedditCategory) -> RedditSource {
        RedditSource {
            client: Arc::clone(self),
            category,
        }
    }
}

pub struct RedditSource {
    client: Arc<RedditClient>,
    category: RedditCategory,
}

#[async_trait]
impl ItemSource for RedditSource {
    fn category(&self) -> &str {
        self.category.as_str()
    }

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        _cutoff: DateTime<Utc>,
    ) -> Result<Page, FetchError> {
        let endpoint = format!(
            "{API_BASE}/user/{}/{}",
            self.client.username,
            self.category.as_str()
        );
        let mut query: Vec<(&str, String)> = vec![
            ("limit", PAGE_SIZE.to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(after) = cursor {
            query.push(("after", after.to_string()));
        }

        let req = self
            .client
            .http
            .get(&endpoint)
            .bearer_auth(&self.client.access_token)
            .header(reqwest::header::USER_AGENT, &self.client.user_agent)
            .query(&query);
        let body = send_json(req, &endpoint).await?;

        parse_listing(&body).map_err(|source| FetchError::Parse {
            endpoint,
            source,
        })
    }
}

/// Parse one listing page: `data.children[].data` records plus the `after`
/// cursor.
pub(crate) fn parse_listing(body: &Value) -> Result<Page, ParseError> {
    let data = body.get("data").ok_or(ParseError::MissingField("data"))?;
    let children = data
        .get("children")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("children"))?;

    let mut items = Vec::with_capacity(children.len());
    for child in children {
        let record = child
            .get("data")
            .ok_or(ParseError::MissingField("data"))?;
        items.push(parse_thing(record)?);
    }

    let next_cursor = data
        .get("after")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Page { items, next_cursor })
}

/// Parse one "thing" (submission or comment). The fullname (`name`, e.g.
/// `t3_abc123`) is the stable ID; `created_utc` arrives as epoch seconds.
pub(crate) fn parse_thing(record: &Value) -> Result<ContentItem, ParseError> {
    let id = require_str(record, "name")?.to_string();
    let created_secs = record
        .get("created_utc")
        .and_then(Value::as_f64)
        .ok_or(ParseError::MissingField("created_utc"))?;
    let created_at = parse_epoch_secs(created_secs, "created_utc")?;

    Ok(ContentItem {
        id,
        created_at,
        payload: record.clone(),
        attachments: extract_attachments(record),
    })
}

/// Media URLs in priority order: reddit-hosted video, gallery images, then
/// a direct image link. Comments and text posts have none.
fn extract_attachments(record: &Value) -> Vec<Attachment> {
    if record.get("is_video").and_then(Value::as_bool) == Some(true) {
        if let Some(url) = record
            .pointer("/media/reddit_video/fallback_url")
            .and_then(Value::as_str)
        {
            return vec![Attachment::from_url(url, "mp4")];
        }
    }

    if let Some(gallery) = record
        .pointer("/gallery_data/items")
        .and_then(Value::as_array)
    {
        let metadata = record.get("media_metadata");
        let mut urls = Vec::new();
        for entry in gallery {
            let Some(media_id) = entry.get("media_id").and_then(Value::as_str) else {
                continue;
            };
            if let Some(url) = metadata
                .and_then(|m| m.pointer(&format!("/{media_id}/s/u")))
                .and_then(Value::as_str)
            {
                urls.push(Attachment::from_url(url, "jpg"));
            }
        }
        if !urls.is_empty() {
            return urls;
        }
    }

    if let Some(url) = record.get("url").and_then(Value::as_str) {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return vec![Attachment::from_url(url, "jpg")];
        }
    }

    Vec::new()
}
