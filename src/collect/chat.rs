//! # Chat sampling
//! Shared pieces of every collector's chat capture:
//!
//! - [`reduce_messages`] turns a raw `(user, text, time)` sample into a [`ChatMetric`].
//! - [`capture_websocket`] runs a time-bounded WebSocket session and hands each
//!   text frame to a platform-specific parser.
//!
//! Capture is best-effort. No step of a session waits past the window deadline,
//! and a transport failure ends the window early with whatever was collected.

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::model::{round_to, ChatMetric, Platform};

/// Longest single wait for a frame before the window deadline is re-checked.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// One observed chat line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            received_at,
        }
    }

    /// Message stamped with the current time.
    pub fn now(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(user, text, Utc::now())
    }
}

/// Reduce a sample to window statistics.
///
/// Entropy is base-2 Shannon entropy over exact-text frequencies; the gap is the
/// mean delta between sorted receive times. Statistics are rounded to 4 decimals.
pub fn reduce_messages(
    messages: &[ChatMessage],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> ChatMetric {
    if messages.is_empty() {
        return ChatMetric::empty(window_end);
    }

    let total = messages.len();
    let unique_users: HashSet<&str> = messages.iter().map(|m| m.user.as_str()).collect();

    let mut freq: HashMap<&str, usize> = HashMap::new();
    for m in messages {
        *freq.entry(m.text.as_str()).or_insert(0) += 1;
    }

    let mut entropy = 0.0f64;
    for &count in freq.values() {
        let p = count as f64 / total as f64;
        if p > 0.0 {
            entropy -= p * p.log2();
        }
    }

    let unique_ratio = freq.len() as f64 / total as f64;

    let mut times: Vec<DateTime<Utc>> = messages.iter().map(|m| m.received_at).collect();
    times.sort();
    let avg_gap = if times.len() > 1 {
        let sum: f64 = times.windows(2).map(|w| seconds_between(w[0], w[1])).sum();
        sum / (times.len() - 1) as f64
    } else {
        0.0
    };

    ChatMetric {
        window_start,
        window_end,
        message_count: total as u64,
        unique_chatters: unique_users.len() as u64,
        message_entropy: round_to(entropy, 4),
        unique_message_ratio: round_to(unique_ratio, 4),
        avg_time_between_msgs: round_to(avg_gap, 4),
    }
}

fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let d = b - a;
    match d.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => d.num_milliseconds() as f64 / 1_000.0,
    }
}

/// What a platform parser wants done with one incoming text frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrameAction {
    Message(ChatMessage),
    /// Send this text back (keepalive replies).
    Reply(String),
}

/// Connect to `url`, send `handshake` frames, then collect messages until `duration`
/// elapses. Never fails: connection problems are logged and yield a partial sample.
///
/// Connect, handshake and receive are all bounded by the window deadline; only
/// the closing handshake may run past it, by at most [`RECV_TIMEOUT`].
pub(crate) async fn capture_websocket<F>(
    platform: Platform,
    url: &str,
    handshake: &[String],
    duration: Duration,
    mut on_text: F,
) -> Vec<ChatMessage>
where
    F: FnMut(&str) -> Vec<FrameAction> + Send,
{
    let deadline = Instant::now() + duration;
    let mut messages = Vec::new();

    let Some((mut ws, _)) = until(
        platform,
        deadline,
        "connect",
        tokio_tungstenite::connect_async(url),
    )
    .await
    else {
        return messages;
    };

    for frame in handshake {
        if until(platform, deadline, "handshake", ws.send(Message::text(frame.clone())))
            .await
            .is_none()
        {
            close_quietly(&mut ws).await;
            return messages;
        }
    }

    'window: loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wait = RECV_TIMEOUT.min(deadline - now);

        let frame = match tokio::time::timeout(wait, ws.next()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::warn!(target: "collect", %platform, error = %e, "chat receive failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                for action in on_text(text.as_str()) {
                    match action {
                        FrameAction::Message(m) => messages.push(m),
                        FrameAction::Reply(reply) => {
                            if until(platform, deadline, "keepalive", ws.send(Message::text(reply)))
                                .await
                                .is_none()
                            {
                                break 'window;
                            }
                        }
                    }
                }
            }
            Message::Ping(payload) => {
                if until(platform, deadline, "pong", ws.send(Message::Pong(payload)))
                    .await
                    .is_none()
                {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    close_quietly(&mut ws).await;
    tracing::debug!(target: "collect", %platform, messages = messages.len(), "chat window closed");
    messages
}

/// Run one session step, giving up at `deadline`. Failures and timeouts are
/// logged and collapse to `None`.
async fn until<T, E, Fut>(
    platform: Platform,
    deadline: Instant,
    step: &'static str,
    fut: Fut,
) -> Option<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(Ok(v)) => Some(v),
        Ok(Err(e)) => {
            tracing::warn!(target: "collect", %platform, step, error = %e, "chat session step failed");
            None
        }
        Err(_) => {
            tracing::warn!(target: "collect", %platform, step, "chat session step timed out");
            None
        }
    }
}

async fn close_quietly<S>(ws: &mut S)
where
    S: futures::Sink<Message> + Unpin,
{
    let _ = tokio::time::timeout(RECV_TIMEOUT, ws.close()).await;
}
