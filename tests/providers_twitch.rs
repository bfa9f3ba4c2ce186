// tests/providers_twitch.rs
//! Twitch app-token lifecycle against a local Helix + OAuth responder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stream_oracle::collect::providers::twitch::{TwitchCollector, TwitchCredentials};
use stream_oracle::Collector;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Default)]
struct Upstream {
    token_ttl_secs: u64,
    streams_unauthorized: bool,
    chatters_unauthorized: bool,
    token_requests: AtomicUsize,
}

impl Upstream {
    fn route(&self, method: &str, path: &str) -> (&'static str, String) {
        let unauthorized = || {
            (
                "401 Unauthorized",
                r#"{"error":"Unauthorized","status":401,"message":"Missing scope"}"#.to_string(),
            )
        };
        match (method, path) {
            ("POST", "/token") => {
                let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
                (
                    "200 OK",
                    format!(
                        r#"{{"access_token":"tok-{n}","expires_in":{},"token_type":"bearer"}}"#,
                        self.token_ttl_secs
                    ),
                )
            }
            ("GET", "/helix/streams") if self.streams_unauthorized => unauthorized(),
            ("GET", "/helix/streams") => (
                "200 OK",
                r#"{"data":[{"user_id":"42","viewer_count":1500,"game_name":"Chess"}],"pagination":{}}"#
                    .to_string(),
            ),
            ("GET", "/helix/chat/chatters") if self.chatters_unauthorized => unauthorized(),
            ("GET", "/helix/chat/chatters") => (
                "200 OK",
                r#"{"data":[{"user_login":"x"}],"total":77}"#.to_string(),
            ),
            _ => ("404 Not Found", "{}".to_string()),
        }
    }

    fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }
}

async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let upstream = upstream.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }
                let head = String::from_utf8_lossy(&buf[..read]).to_string();
                let mut parts = head.split_whitespace();
                let method = parts.next().unwrap_or("GET").to_string();
                let target = parts.next().unwrap_or("/");
                let path = target.split('?').next().unwrap_or("/").to_string();

                let (status, body) = upstream.route(&method, &path);
                let resp = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

async fn collector(upstream: Arc<Upstream>) -> TwitchCollector {
    let base = spawn_upstream(upstream).await;
    TwitchCollector::new(TwitchCredentials::new("client", "secret"))
        .with_helix_base(format!("{base}/helix"))
        .with_token_url(format!("{base}/token"))
}

#[tokio::test]
async fn valid_token_is_reused_across_calls() {
    let upstream = Arc::new(Upstream {
        token_ttl_secs: 3600,
        ..Default::default()
    });
    let twitch = collector(upstream.clone()).await;

    for _ in 0..3 {
        let status = twitch.collect_viewers("live").await.unwrap();
        assert!(status.is_live);
        assert_eq!(status.viewer_count, 1500);
        assert_eq!(status.chatter_count, 77);
        assert_eq!(status.category.as_deref(), Some("Chess"));
    }
    assert_eq!(upstream.token_requests(), 1);
}

#[tokio::test]
async fn scope_refusal_on_chatters_keeps_the_token() {
    let upstream = Arc::new(Upstream {
        token_ttl_secs: 3600,
        chatters_unauthorized: true,
        ..Default::default()
    });
    let twitch = collector(upstream.clone()).await;

    for _ in 0..3 {
        let status = twitch.collect_viewers("live").await.unwrap();
        assert!(status.is_live);
        assert_eq!(status.chatter_count, 0);
    }
    assert_eq!(upstream.token_requests(), 1);
}

#[tokio::test]
async fn token_inside_refresh_margin_is_renewed() {
    // 30s of life is already inside the 60s margin: every request refreshes.
    let upstream = Arc::new(Upstream {
        token_ttl_secs: 30,
        ..Default::default()
    });
    let twitch = collector(upstream.clone()).await;

    let status = twitch.collect_viewers("live").await.unwrap();
    assert_eq!(status.chatter_count, 77);
    // One for /streams, one for /chat/chatters.
    assert_eq!(upstream.token_requests(), 2);
}

#[tokio::test]
async fn unauthorized_core_endpoint_drops_the_token() {
    let upstream = Arc::new(Upstream {
        token_ttl_secs: 3600,
        streams_unauthorized: true,
        ..Default::default()
    });
    let twitch = collector(upstream.clone()).await;

    let err = twitch.collect_viewers("live").await.unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
    twitch.collect_viewers("live").await.unwrap_err();
    assert_eq!(upstream.token_requests(), 2);
}
