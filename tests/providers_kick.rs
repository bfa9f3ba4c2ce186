// tests/providers_kick.rs
//! Kick collector against a local one-shot HTTP responder serving fixtures.

use std::time::Duration;

use stream_oracle::collect::providers::kick::{KickChannel, KickCollector};
use stream_oracle::collect::LiveStatus;
use stream_oracle::{Collector, Platform};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const FIXTURE: &str = include_str!("fixtures/kick_channel.json");

/// Serve `GET /{slug}` forever: `xqc` → fixture, `blocked` → 403, `broken` →
/// 500, anything else → 404.
async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }
                let head = String::from_utf8_lossy(&buf[..read]);
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = match path.trim_start_matches('/') {
                    "xqc" => ("200 OK", FIXTURE.to_string()),
                    "offline" => ("200 OK", r#"{"id":9,"slug":"offline","livestream":null}"#.to_string()),
                    "blocked" => ("403 Forbidden", "blocked".to_string()),
                    "broken" => ("500 Internal Server Error", "oops".to_string()),
                    _ => ("404 Not Found", "{}".to_string()),
                };
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

#[test]
fn fixture_decodes_to_normalized_records() {
    let ch: KickChannel = serde_json::from_str(FIXTURE).unwrap();
    let info = ch.to_channel_info("XQC");
    assert_eq!(info.platform, Platform::Kick);
    assert_eq!(info.platform_id, "668");
    assert_eq!(info.username, "xqc");
    assert_eq!(info.display_name, "xQc");
    assert_eq!(info.category.as_deref(), Some("Just Chatting"));
    assert_eq!(info.follower_count, 812_345);
    assert!(info.avatar_url.is_some());

    assert_eq!(
        ch.live_status(),
        LiveStatus::live(53_120, 0, Some("Just Chatting".into()))
    );
    assert_eq!(ch.chatroom_id(), Some(668));
}

#[tokio::test]
async fn live_channel_over_http() {
    let base = spawn_server().await;
    let kick = KickCollector::new().with_api_base(&base);

    let info = kick.collect_channel_info("xqc").await.unwrap().unwrap();
    assert_eq!(info.follower_count, 812_345);

    let status = kick.collect_viewers("xqc").await.unwrap();
    assert!(status.is_live);
    assert_eq!(status.viewer_count, 53_120);
    assert_eq!(status.chatter_count, 0);

    let status = kick.collect_viewers("offline").await.unwrap();
    assert_eq!(status, LiveStatus::offline());
}

#[tokio::test]
async fn absence_and_blocks_degrade_to_empty() {
    let base = spawn_server().await;
    let kick = KickCollector::new().with_api_base(&base);

    assert!(kick.collect_channel_info("nobody").await.unwrap().is_none());
    assert_eq!(
        kick.collect_viewers("blocked").await.unwrap(),
        LiveStatus::offline()
    );
    // Unknown channel has no chatroom: empty metric, no socket opened.
    let m = kick
        .collect_chat_metrics("nobody", Duration::from_secs(30))
        .await
        .unwrap();
    assert!(m.is_empty());
}

#[tokio::test]
async fn server_errors_propagate() {
    let base = spawn_server().await;
    let kick = KickCollector::new().with_api_base(&base);
    let err = kick.collect_viewers("broken").await.unwrap_err();
    assert!(!err.is_quota());
    assert!(err.to_string().contains("500"), "{err}");
}
