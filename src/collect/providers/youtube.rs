//! YouTube collector: Data API v3 with an API key and a daily unit quota.
//!
//! Unit costs: `search` 100, `channels`/`videos` 1, one `liveChat/messages`
//! poll 5. Live lookups take the channel id as identifier. Chat is polled, not
//! streamed, honoring `pollingIntervalMillis` within the capture window.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::collect::chat::{reduce_messages, ChatMessage};
use crate::collect::error::CollectorError;
use crate::collect::http::{default_client, get_json};
use crate::collect::quota::DailyQuota;
use crate::collect::types::{ChannelInfo, Collector, LiveStatus};
use crate::model::{ChatMetric, Platform};
use crate::rate_limiter::RateLimiter;

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DAILY_QUOTA_LIMIT: u32 = 10_000;

const SEARCH_COST: u32 = 100;
const LIST_COST: u32 = 1;
const CHAT_POLL_COST: u32 = 5;
const DEFAULT_POLL_MS: u64 = 5_000;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ItemList<T> {
    #[serde(default)]
    items: Vec<T>,
}

impl<T> ItemList<T> {
    fn first(self) -> Option<T> {
        self.items.into_iter().next()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    id: SearchId,
    #[serde(default)]
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct YtChannel {
    #[serde(default)]
    snippet: YtChannelSnippet,
    #[serde(default)]
    statistics: YtStatistics,
}

#[derive(Debug, Default, Deserialize)]
struct YtChannelSnippet {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnails: YtThumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct YtThumbnails {
    #[serde(default)]
    default: Option<YtThumbnail>,
}

#[derive(Debug, Deserialize)]
struct YtThumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtStatistics {
    /// The API returns counts as decimal strings.
    #[serde(default)]
    subscriber_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtVideo {
    #[serde(default)]
    live_streaming_details: Option<LiveDetails>,
    #[serde(default)]
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveDetails {
    #[serde(default)]
    concurrent_viewers: Option<String>,
    #[serde(default)]
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatPage {
    #[serde(default)]
    items: Vec<ChatItem>,
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    polling_interval_millis: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatItem {
    #[serde(default)]
    snippet: Option<ChatSnippet>,
    #[serde(default)]
    author_details: Option<ChatAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatSnippet {
    #[serde(default)]
    display_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatAuthor {
    #[serde(default)]
    display_name: Option<String>,
}

impl ChatItem {
    /// Items without an author are skipped so they do not count as a chatter.
    fn into_message(self) -> Option<ChatMessage> {
        let user = self
            .author_details
            .and_then(|a| a.display_name)
            .filter(|n| !n.is_empty())?;
        let text = self
            .snippet
            .and_then(|s| s.display_message)
            .unwrap_or_default();
        Some(ChatMessage::now(user, text))
    }
}

fn parse_count(s: Option<&str>) -> u64 {
    s.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

pub struct YouTubeCollector {
    http: Client,
    api_key: String,
    api_base: String,
    limiter: RateLimiter,
    quota: DailyQuota,
}

impl YouTubeCollector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: default_client(),
            api_key: api_key.into(),
            api_base: API_BASE.to_string(),
            limiter: RateLimiter::new(10.0, 10),
            quota: DailyQuota::new(Platform::YouTube, DAILY_QUOTA_LIMIT),
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_quota(mut self, quota: DailyQuota) -> Self {
        self.quota = quota;
        self
    }

    pub fn quota(&self) -> &DailyQuota {
        &self.quota
    }

    /// Charge `cost` units, then issue the call. Without an API key nothing is sent.
    async fn api_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        cost: u32,
    ) -> Result<Option<T>, CollectorError> {
        if self.api_key.trim().is_empty() {
            tracing::warn!(target: "collect", platform = "youtube", "API key not configured, skipping");
            return Ok(None);
        }
        self.quota.charge(cost)?;

        let req = self
            .http
            .get(format!("{}/{}", self.api_base.trim_end_matches('/'), endpoint))
            .query(params)
            .query(&[("key", self.api_key.as_str())]);
        get_json(Platform::YouTube, &self.limiter, req, endpoint).await
    }

    async fn find_live_video(&self, channel_id: &str) -> Result<Option<String>, CollectorError> {
        let found: Option<ItemList<SearchItem>> = self
            .api_get(
                "search",
                &[
                    ("part", "id"),
                    ("channelId", channel_id),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("maxResults", "1"),
                ],
                SEARCH_COST,
            )
            .await?;
        Ok(found
            .and_then(ItemList::first)
            .and_then(|item| item.id.video_id)
            .filter(|id| !id.is_empty()))
    }

    async fn fetch_video(&self, video_id: &str, part: &str) -> Result<Option<YtVideo>, CollectorError> {
        let videos: Option<ItemList<YtVideo>> = self
            .api_get("videos", &[("part", part), ("id", video_id)], LIST_COST)
            .await?;
        Ok(videos.and_then(ItemList::first))
    }
}

#[async_trait]
impl Collector for YouTubeCollector {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn collect_channel_info(
        &self,
        username: &str,
    ) -> Result<Option<ChannelInfo>, CollectorError> {
        let found: Option<ItemList<SearchItem>> = self
            .api_get(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", username),
                    ("type", "channel"),
                    ("maxResults", "1"),
                ],
                SEARCH_COST,
            )
            .await?;
        let Some(channel_id) = found
            .and_then(ItemList::first)
            .and_then(|i| i.snippet)
            .map(|s| s.channel_id)
        else {
            return Ok(None);
        };

        let channels: Option<ItemList<YtChannel>> = self
            .api_get(
                "channels",
                &[("part", "snippet,statistics"), ("id", channel_id.as_str())],
                LIST_COST,
            )
            .await?;
        let Some(ch) = channels.and_then(ItemList::first) else {
            return Ok(None);
        };

        Ok(Some(ChannelInfo {
            platform: Platform::YouTube,
            platform_id: channel_id,
            username: username.to_string(),
            display_name: ch.snippet.title.unwrap_or_else(|| username.to_string()),
            avatar_url: ch.snippet.thumbnails.default.map(|t| t.url),
            category: None,
            follower_count: parse_count(ch.statistics.subscriber_count.as_deref()),
        }))
    }

    async fn collect_viewers(&self, username: &str) -> Result<LiveStatus, CollectorError> {
        let Some(video_id) = self.find_live_video(username).await? else {
            return Ok(LiveStatus::offline());
        };
        let Some(video) = self
            .fetch_video(&video_id, "liveStreamingDetails,snippet")
            .await?
        else {
            return Ok(LiveStatus::offline());
        };

        let viewers = parse_count(
            video
                .live_streaming_details
                .as_ref()
                .and_then(|d| d.concurrent_viewers.as_deref()),
        );
        Ok(LiveStatus::live(
            viewers,
            0,
            video.snippet.and_then(|s| s.category_id),
        ))
    }

    async fn collect_chat_metrics(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<ChatMetric, CollectorError> {
        let Some(video_id) = self.find_live_video(username).await? else {
            return Ok(ChatMetric::empty(Utc::now()));
        };
        let Some(live_chat_id) = self
            .fetch_video(&video_id, "liveStreamingDetails")
            .await?
            .and_then(|v| v.live_streaming_details)
            .and_then(|d| d.active_live_chat_id)
        else {
            return Ok(ChatMetric::empty(Utc::now()));
        };

        let window_start = Utc::now();
        let deadline = Instant::now() + duration;
        let mut messages = Vec::new();
        let mut page_token: Option<String> = None;

        while Instant::now() < deadline {
            let mut params = vec![
                ("part", "snippet,authorDetails"),
                ("liveChatId", live_chat_id.as_str()),
                ("maxResults", "200"),
            ];
            if let Some(tok) = page_token.as_deref() {
                params.push(("pageToken", tok));
            }

            let page: ChatPage = match self
                .api_get("liveChat/messages", &params, CHAT_POLL_COST)
                .await
            {
                Ok(Some(p)) => p,
                Ok(None) => break,
                Err(e) if e.is_quota() => return Err(e),
                Err(e) => {
                    tracing::warn!(target: "collect", platform = "youtube", %username, error = %e, "chat poll failed");
                    break;
                }
            };

            messages.extend(page.items.into_iter().filter_map(ChatItem::into_message));
            page_token = page.next_page_token;

            let poll = Duration::from_millis(page.polling_interval_millis.unwrap_or(DEFAULT_POLL_MS));
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(poll.min(remaining)).await;
        }

        Ok(reduce_messages(&messages, window_start, Utc::now()))
    }
}
