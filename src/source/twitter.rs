//! Twitter/X v2 API: own tweets, bookmarks, likes.
//!
//! The tweets timeline accepts `end_time`, so the cutoff is pushed
//! server-side there; bookmarks and likes have no such parameter and rely
//! on the client-side filter alone. Media arrives out-of-band in the page's
//! `includes.media` array, joined to tweets by `media_key`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::send_json;
use crate::credentials::Credentials;
use crate::fetch::{FetchError, ItemSource, Page};
use crate::item::{parse_rfc3339_utc, require_str, Attachment, ContentItem, ParseError};

const API_BASE: &str = "https://api.twitter.com/2";
const PAGE_SIZE: u32 = 100;
const TWEET_FIELDS: &str = "id,text,created_at,author_id,public_metrics,attachments,entities";
const EXPANSIONS: &str = "attachments.media_keys,author_id";
const MEDIA_FIELDS: &str = "type,url,preview_image_url,variants,media_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwitterCategory {
    Tweets,
    Bookmarks,
    Likes,
}

impl TwitterCategory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tweets" => Some(TwitterCategory::Tweets),
            "bookmarks" => Some(TwitterCategory::Bookmarks),
            "likes" => Some(TwitterCategory::Likes),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TwitterCategory::Tweets => "tweets",
            TwitterCategory::Bookmarks => "bookmarks",
            TwitterCategory::Likes => "likes",
        }
    }

    fn endpoint_segment(&self) -> &'static str {
        match self {
            TwitterCategory::Tweets => "tweets",
            TwitterCategory::Bookmarks => "bookmarks",
            TwitterCategory::Likes => "liked_tweets",
        }
    }

    /// Only the tweets timeline supports `end_time`.
    fn supports_end_time(&self) -> bool {
        matches!(self, TwitterCategory::Tweets)
    }
}

pub struct TwitterClient {
    http: reqwest::Client,
    bearer_token: String,
    user_id: String,
}

impl TwitterClient {
    /// Resolve the account's numeric user ID up front; every category
    /// endpoint is keyed by it.
    pub async fn connect(
        http: reqwest::Client,
        username: &str,
        creds: &Credentials,
    ) -> anyhow::Result<Arc<Self>> {
        let bearer_token = creds.require("bearer_token")?.to_string();

        let endpoint = format!("{API_BASE}/users/by/username/{username}");
        let response = http
            .get(&endpoint)
            .bearer_auth(&bearer_token)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        let user_id = body
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("could not resolve user ID for @{username}"))?
            .to_string();

        Ok(Arc::new(Self {
            http,
            bearer_token,
            user_id,
        }))
    }

    pub fn source(self: &Arc<Self>, category: TwitterCategory) -> TwitterSource {
        TwitterSource {
            client: Arc::clone(self),
            category,
        }
    }
}

pub struct TwitterSource {
    client: Arc<TwitterClient>,
    category: TwitterCategory,
}

#[async_trait]
impl ItemSource for TwitterSource {
    fn category(&self) -> &str {
        self.category.as_str()
    }

    fn supports_cutoff(&self) -> bool {
        self.category.supports_end_time()
    }

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Page, FetchError> {
        let endpoint = format!(
            "{API_BASE}/users/{}/{}",
            self.client.user_id,
            self.category.endpoint_segment()
        );
        let mut query: Vec<(&str, String)> = vec![
            ("max_results", PAGE_SIZE.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", EXPANSIONS.to_string()),
            ("media.fields", MEDIA_FIELDS.to_string()),
        ];
        if self.category.supports_end_time() {
            query.push(("end_time", cutoff.to_rfc3339()));
        }
        if let Some(token) = cursor {
            query.push(("pagination_token", token.to_string()));
        }

        let req = self
            .client
            .http
            .get(&endpoint)
            .bearer_auth(&self.client.bearer_token)
            .query(&query);
        let body = send_json(req, &endpoint).await?;

        parse_page(&body).map_err(|source| FetchError::Parse { endpoint, source })
    }
}

/// Parse one v2 page: `data[]` tweets joined with `includes.media` by
/// media key, plus `meta.next_token`.
pub(crate) fn parse_page(body: &Value) -> Result<Page, ParseError> {
    let media_lookup = build_media_lookup(body);

    // An empty timeline has no `data` key at all.
    let tweets = body.get("data").and_then(Value::as_array);
    let mut items = Vec::new();
    if let Some(tweets) = tweets {
        items.reserve(tweets.len());
        for tweet in tweets {
            items.push(parse_tweet(tweet, &media_lookup)?);
        }
    }

    let next_cursor = body
        .pointer("/meta/next_token")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Page { items, next_cursor })
}

fn build_media_lookup(body: &Value) -> HashMap<&str, &Value> {
    body.pointer("/includes/media")
        .and_then(Value::as_array)
        .map(|media| {
            media
                .iter()
                .filter_map(|m| m.get("media_key").and_then(Value::as_str).map(|k| (k, m)))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_tweet(
    tweet: &Value,
    media_lookup: &HashMap<&str, &Value>,
) -> Result<ContentItem, ParseError> {
    let id = require_str(tweet, "id")?.to_string();
    let created_at = parse_rfc3339_utc(require_str(tweet, "created_at")?, "created_at")?;

    let mut attachments = Vec::new();
    if let Some(keys) = tweet
        .pointer("/attachments/media_keys")
        .and_then(Value::as_array)
    {
        for key in keys.iter().filter_map(Value::as_str) {
            let Some(media) = media_lookup.get(key) else {
                continue;
            };
            if let Some(attachment) = media_attachment(media) {
                attachments.push(attachment);
            }
        }
    }

    Ok(ContentItem {
        id,
        created_at,
        payload: tweet.clone(),
        attachments,
    })
}

/// Best download URL for a media object: photos use `url`; videos and
/// animated GIFs use the highest-bitrate MP4 variant.
fn media_attachment(media: &Value) -> Option<Attachment> {
    match media.get("type").and_then(Value::as_str) {
        Some("photo") => media
            .get("url")
            .and_then(Value::as_str)
            .map(|url| Attachment::from_url(url, "jpg")),
        Some("video") | Some("animated_gif") => {
            let variants = media.get("variants").and_then(Value::as_array)?;
            let best = variants
                .iter()
                .filter(|v| {
                    v.get("content_type").and_then(Value::as_str) == Some("video/mp4")
                })
                .max_by_key(|v| v.get("bit_rate").and_then(Value::as_u64).unwrap_or(0))
                .or_else(|| variants.first())?;
            best.get("url")
                .and_then(Value::as_str)
                .map(|url| Attachment::from_url(url, "mp4"))
        }
        _ => None,
    }
}
