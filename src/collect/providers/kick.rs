//! Kick collector: public channel JSON + Pusher WebSocket chat. No credentials.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::collect::chat::{capture_websocket, reduce_messages, ChatMessage, FrameAction};
use crate::collect::error::CollectorError;
use crate::collect::http::{get_json, HTTP_TIMEOUT};
use crate::collect::types::{ChannelInfo, Collector, LiveStatus};
use crate::model::{ChatMetric, Platform};
use crate::rate_limiter::RateLimiter;

pub const API_BASE: &str = "https://kick.com/api/v2/channels";
pub const PUSHER_URL: &str =
    "wss://ws-us2.pusher.com/app/32cbd69e4b950bf97679?protocol=7&client=js&version=7.4.0&flash=false";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CHAT_EVENT: &str = "App\\Events\\ChatMessageEvent";
const PONG: &str = r#"{"event":"pusher:pong","data":{}}"#;

/// Subset of `GET /api/v2/channels/{slug}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KickChannel {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub user: Option<KickUser>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub recent_categories: Vec<KickCategory>,
    #[serde(default)]
    pub livestream: Option<KickLivestream>,
    #[serde(default)]
    pub chatroom: Option<KickChatroom>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KickUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KickCategory {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KickLivestream {
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub categories: Vec<KickCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KickChatroom {
    pub id: u64,
}

impl KickChannel {
    pub fn to_channel_info(&self, requested: &str) -> ChannelInfo {
        let user = self.user.clone().unwrap_or_default();
        ChannelInfo {
            platform: Platform::Kick,
            platform_id: self.id.to_string(),
            username: self.slug.clone().unwrap_or_else(|| requested.to_string()),
            display_name: user.username.unwrap_or_else(|| requested.to_string()),
            avatar_url: user.profile_pic,
            category: first_category(&self.recent_categories),
            follower_count: self.followers_count,
        }
    }

    /// Kick exposes no chatter count; it is always 0.
    pub fn live_status(&self) -> LiveStatus {
        match &self.livestream {
            Some(ls) => LiveStatus::live(ls.viewer_count, 0, first_category(&ls.categories)),
            None => LiveStatus::offline(),
        }
    }

    pub fn chatroom_id(&self) -> Option<u64> {
        self.chatroom.as_ref().map(|c| c.id)
    }
}

fn first_category(cats: &[KickCategory]) -> Option<String> {
    cats.first().and_then(|c| c.name.clone())
}

pub struct KickCollector {
    http: Client,
    api_base: String,
    pusher_url: String,
    limiter: RateLimiter,
}

impl Default for KickCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl KickCollector {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            api_base: API_BASE.to_string(),
            pusher_url: PUSHER_URL.to_string(),
            limiter: RateLimiter::new(2.0, 5),
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_pusher_url(mut self, url: impl Into<String>) -> Self {
        self.pusher_url = url.into();
        self
    }

    async fn fetch_channel(&self, username: &str) -> Result<Option<KickChannel>, CollectorError> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), username);
        let req = self.http.get(url).header("Accept", "application/json");
        get_json(Platform::Kick, &self.limiter, req, username).await
    }
}

#[async_trait]
impl Collector for KickCollector {
    fn platform(&self) -> Platform {
        Platform::Kick
    }

    async fn collect_channel_info(
        &self,
        username: &str,
    ) -> Result<Option<ChannelInfo>, CollectorError> {
        Ok(self
            .fetch_channel(username)
            .await?
            .map(|ch| ch.to_channel_info(username)))
    }

    async fn collect_viewers(&self, username: &str) -> Result<LiveStatus, CollectorError> {
        Ok(self
            .fetch_channel(username)
            .await?
            .map(|ch| ch.live_status())
            .unwrap_or_else(LiveStatus::offline))
    }

    async fn collect_chat_metrics(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<ChatMetric, CollectorError> {
        let Some(chatroom_id) = self
            .fetch_channel(username)
            .await?
            .and_then(|ch| ch.chatroom_id())
        else {
            return Ok(ChatMetric::empty(Utc::now()));
        };

        let window_start = Utc::now();
        let messages = capture_websocket(
            Platform::Kick,
            &self.pusher_url,
            &[subscribe_frame(chatroom_id)],
            duration,
            parse_pusher_frame,
        )
        .await;
        Ok(reduce_messages(&messages, window_start, Utc::now()))
    }
}

pub fn subscribe_frame(chatroom_id: u64) -> String {
    serde_json::json!({
        "event": "pusher:subscribe",
        "data": { "channel": format!("chatrooms.{chatroom_id}.v2") },
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct PusherEnvelope {
    #[serde(default)]
    event: String,
    /// Pusher double-encodes event payloads as a JSON string.
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PusherChat {
    content: String,
    sender: KickUser,
}

pub(crate) fn parse_pusher_frame(frame: &str) -> Vec<FrameAction> {
    let Ok(env) = serde_json::from_str::<PusherEnvelope>(frame) else {
        return Vec::new();
    };

    match env.event.as_str() {
        "pusher:ping" => vec![FrameAction::Reply(PONG.to_string())],
        CHAT_EVENT => {
            let chat: Option<PusherChat> = match env.data {
                Some(serde_json::Value::String(s)) => serde_json::from_str(&s).ok(),
                Some(v @ serde_json::Value::Object(_)) => serde_json::from_value(v).ok(),
                _ => None,
            };
            // A message without a sender would skew chatter counts; skip it.
            match chat.and_then(|c| c.sender.username.map(|user| (user, c.content))) {
                Some((user, text)) => vec![FrameAction::Message(ChatMessage::now(user, text))],
                None => {
                    tracing::debug!(target: "collect", platform = "kick", "undecodable chat event dropped");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_channel_has_zero_counts() {
        let ch: KickChannel = serde_json::from_str(r#"{"id":7,"slug":"abc","livestream":null}"#).unwrap();
        assert_eq!(ch.live_status(), LiveStatus::offline());
    }

    #[test]
    fn chat_event_with_string_payload() {
        let frame = serde_json::json!({
            "event": "App\\Events\\ChatMessageEvent",
            "data": "{\"content\":\"gg\",\"sender\":{\"username\":\"viewer1\"}}",
            "channel": "chatrooms.1.v2"
        })
        .to_string();
        match parse_pusher_frame(&frame).as_slice() {
            [FrameAction::Message(m)] => {
                assert_eq!(m.user, "viewer1");
                assert_eq!(m.text, "gg");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undecodable_chat_events_are_dropped() {
        let event = |data: serde_json::Value| {
            serde_json::json!({ "event": "App\\Events\\ChatMessageEvent", "data": data }).to_string()
        };
        assert!(parse_pusher_frame(&event(serde_json::json!("{not json"))).is_empty());
        assert!(parse_pusher_frame(&event(serde_json::json!({ "content": "hi" }))).is_empty());
        assert!(parse_pusher_frame(&event(serde_json::json!({ "content": "hi", "sender": {} }))).is_empty());
        assert!(parse_pusher_frame(&event(serde_json::Value::Null)).is_empty());

        let ok = event(serde_json::json!({ "content": "hi", "sender": { "username": "v" } }));
        assert_eq!(parse_pusher_frame(&ok).len(), 1);
    }

    #[test]
    fn ping_gets_pong_and_noise_is_ignored() {
        assert_eq!(
            parse_pusher_frame(r#"{"event":"pusher:ping","data":{}}"#),
            vec![FrameAction::Reply(PONG.to_string())]
        );
        assert!(parse_pusher_frame(r#"{"event":"pusher_internal:subscription_succeeded"}"#).is_empty());
        assert!(parse_pusher_frame("not json").is_empty());
    }

    #[test]
    fn subscribe_frame_targets_chatroom() {
        let v: serde_json::Value = serde_json::from_str(&subscribe_frame(99)).unwrap();
        assert_eq!(v["event"], "pusher:subscribe");
        assert_eq!(v["data"]["channel"], "chatrooms.99.v2");
    }
}
