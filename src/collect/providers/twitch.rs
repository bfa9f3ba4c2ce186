//! Twitch collector: Helix REST for metadata/counts, anonymous IRC-over-WebSocket for chat.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::collect::chat::{capture_websocket, reduce_messages, ChatMessage, FrameAction};
use crate::collect::credentials::TokenCache;
use crate::collect::error::CollectorError;
use crate::collect::http::{default_client, get_json};
use crate::collect::types::{ChannelInfo, Collector, LiveStatus};
use crate::model::{ChatMetric, Platform};
use crate::rate_limiter::RateLimiter;

pub const HELIX_BASE: &str = "https://api.twitch.tv/helix";
pub const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Helix allows 800 points per minute for app tokens.
const HELIX_REQUESTS_PER_MINUTE: u32 = 800;
const HELIX_BURST: u32 = 800;
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Default)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl TwitchCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct HelixPage<T> {
    #[serde(default)]
    data: Vec<T>,
    #[serde(default)]
    total: Option<u64>,
}

impl<T> HelixPage<T> {
    fn first(self) -> Option<T> {
        self.data.into_iter().next()
    }
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixChannel {
    #[serde(default)]
    game_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    user_id: String,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    game_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_ttl")]
    expires_in: u64,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

pub struct TwitchCollector {
    http: Client,
    credentials: TwitchCredentials,
    helix_base: String,
    token_url: String,
    irc_url: String,
    limiter: RateLimiter,
    token: Mutex<TokenCache>,
}

impl TwitchCollector {
    pub fn new(credentials: TwitchCredentials) -> Self {
        Self {
            http: default_client(),
            credentials,
            helix_base: HELIX_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            irc_url: IRC_URL.to_string(),
            limiter: RateLimiter::per_period(
                HELIX_REQUESTS_PER_MINUTE,
                Duration::from_secs(60),
                HELIX_BURST,
            ),
            token: Mutex::new(TokenCache::default()),
        }
    }

    pub fn with_helix_base(mut self, url: impl Into<String>) -> Self {
        self.helix_base = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_irc_url(mut self, url: impl Into<String>) -> Self {
        self.irc_url = url.into();
        self
    }

    /// Current app token, refreshing it when missing or about to expire.
    /// `Ok(None)` means no credentials are configured.
    async fn ensure_token(&self) -> Result<Option<String>, CollectorError> {
        if !self.credentials.is_configured() {
            tracing::warn!(target: "collect", platform = "twitch", "credentials not configured, skipping");
            return Ok(None);
        }

        let mut cache = self.token.lock().await;
        if let Some(tok) = cache.valid_token(Instant::now()) {
            return Ok(Some(tok.to_string()));
        }

        let req = self.http.post(&self.token_url).query(&[
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ]);
        let resp: TokenResponse = match get_json(Platform::Twitch, &self.limiter, req, "oauth2/token").await {
            Ok(Some(r)) => r,
            Ok(None) => {
                return Err(CollectorError::Auth {
                    platform: Platform::Twitch,
                    message: "token endpoint refused the client".into(),
                })
            }
            Err(CollectorError::Status { status, .. }) => {
                return Err(CollectorError::Auth {
                    platform: Platform::Twitch,
                    message: format!("token endpoint returned HTTP {status}"),
                })
            }
            Err(e) => return Err(e),
        };

        cache.store(
            resp.access_token.clone(),
            Duration::from_secs(resp.expires_in),
            Instant::now(),
        );
        tracing::info!(target: "collect", platform = "twitch", "access token refreshed");
        Ok(Some(resp.access_token))
    }

    async fn helix_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<HelixPage<T>>, CollectorError> {
        self.helix_request(endpoint, query, OnUnauthorized::DropToken).await
    }

    async fn helix_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        on_401: OnUnauthorized,
    ) -> Result<Option<HelixPage<T>>, CollectorError> {
        let Some(token) = self.ensure_token().await? else {
            return Ok(None);
        };

        let req = self
            .http
            .get(format!("{}{}", self.helix_base, endpoint))
            .header("Client-ID", &self.credentials.client_id)
            .bearer_auth(token)
            .query(query);

        let out = get_json(Platform::Twitch, &self.limiter, req, endpoint).await;
        if let Err(CollectorError::Status { status: 401, .. }) = &out {
            if on_401 == OnUnauthorized::DropToken {
                // Revoked or rotated token: force a refresh on the next call.
                self.token.lock().await.clear();
            }
        }
        out
    }
}

/// What a 401 says about the cached app token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnUnauthorized {
    DropToken,
    /// The endpoint wants a user scope an app token never carries.
    KeepToken,
}

#[async_trait]
impl Collector for TwitchCollector {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn collect_channel_info(
        &self,
        username: &str,
    ) -> Result<Option<ChannelInfo>, CollectorError> {
        let user = match self.helix_get::<HelixUser>("/users", &[("login", username)]).await? {
            Some(page) => match page.first() {
                Some(u) => u,
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        let category = self
            .helix_get::<HelixChannel>("/channels", &[("broadcaster_id", user.id.as_str())])
            .await?
            .and_then(HelixPage::first)
            .and_then(|c| non_empty(c.game_name));

        let follower_count = self
            .helix_get::<IgnoredAny>(
                "/channels/followers",
                &[("broadcaster_id", user.id.as_str()), ("first", "1")],
            )
            .await?
            .and_then(|p| p.total)
            .unwrap_or(0);

        Ok(Some(ChannelInfo {
            platform: Platform::Twitch,
            platform_id: user.id,
            username: user.login,
            display_name: user.display_name,
            avatar_url: non_empty(user.profile_image_url),
            category,
            follower_count,
        }))
    }

    async fn collect_viewers(&self, username: &str) -> Result<LiveStatus, CollectorError> {
        let stream = match self
            .helix_get::<HelixStream>("/streams", &[("user_login", username)])
            .await?
            .and_then(HelixPage::first)
        {
            Some(s) => s,
            None => return Ok(LiveStatus::offline()),
        };

        // Chatter lists need moderator scope; failure here only loses the count.
        let chatter_count = match self
            .helix_request::<IgnoredAny>(
                "/chat/chatters",
                &[
                    ("broadcaster_id", stream.user_id.as_str()),
                    ("moderator_id", stream.user_id.as_str()),
                ],
                OnUnauthorized::KeepToken,
            )
            .await
        {
            Ok(page) => page.and_then(|p| p.total).unwrap_or(0),
            Err(e) => {
                tracing::warn!(target: "collect", platform = "twitch", %username, error = %e, "chatter count unavailable");
                0
            }
        };

        Ok(LiveStatus::live(
            stream.viewer_count,
            chatter_count,
            non_empty(stream.game_name),
        ))
    }

    async fn collect_chat_metrics(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<ChatMetric, CollectorError> {
        let window_start = Utc::now();
        let handshake = irc_handshake(username);
        let messages = capture_websocket(
            Platform::Twitch,
            &self.irc_url,
            &handshake,
            duration,
            parse_irc_frame,
        )
        .await;
        Ok(reduce_messages(&messages, window_start, Utc::now()))
    }
}

/// Anonymous read-only login followed by a channel join.
pub fn irc_handshake(username: &str) -> Vec<String> {
    vec![
        "CAP REQ :twitch.tv/tags".to_string(),
        "PASS SCHMOOPIIE".to_string(),
        "NICK justinfan12345".to_string(),
        format!("JOIN #{}", username.to_ascii_lowercase()),
    ]
}

/// One WebSocket frame may carry several CRLF-separated IRC lines.
pub(crate) fn parse_irc_frame(frame: &str) -> Vec<FrameAction> {
    static RE_PRIVMSG: OnceCell<Regex> = OnceCell::new();
    let re = RE_PRIVMSG.get_or_init(|| {
        Regex::new(r"^(?:@\S+\s+)?:(?P<nick>[^!\s]+)!\S+\s+PRIVMSG\s+#\S+\s+:(?P<text>.*)$")
            .expect("privmsg regex")
    });

    let mut out = Vec::new();
    for line in frame.split("\r\n").map(str::trim_end).filter(|l| !l.is_empty()) {
        if line.starts_with("PING") {
            out.push(FrameAction::Reply(line.replacen("PING", "PONG", 1)));
            continue;
        }
        if let Some(caps) = re.captures(line) {
            let nick = caps.name("nick").map_or("unknown", |m| m.as_str());
            let text = caps.name("text").map_or("", |m| m.as_str().trim());
            out.push(FrameAction::Message(ChatMessage::now(nick, text)));
        }
    }
    out
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}
