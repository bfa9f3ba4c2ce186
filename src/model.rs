//! # Data model
//! Shared records flowing between collectors, the store and the analysis engine.
//!
//! - [`Channel`]: identity + mutable descriptive metadata.
//! - [`ViewerSnapshot`]: append-only viewer/chatter observation.
//! - [`ChatMetric`]: one reduced chat-sampling window.
//! - [`AnalysisResult`]: immutable output of one engine run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Streaming platforms with a collector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    Kick,
    #[serde(rename = "youtube")]
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Twitch, Platform::Kick, Platform::YouTube];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Kick => "kick",
            Platform::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twitch" => Ok(Platform::Twitch),
            "kick" => Ok(Platform::Kick),
            "youtube" => Ok(Platform::YouTube),
            other => anyhow::bail!("unsupported platform: {other}"),
        }
    }
}

/// Identity of a tracked channel: `(platform, username)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub platform: Platform,
    pub username: String,
}

impl ChannelKey {
    pub fn new(platform: Platform, username: impl Into<String>) -> Self {
        Self {
            platform,
            username: username.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub key: ChannelKey,
    /// Platform-side id; empty until the first successful info collection.
    #[serde(default)]
    pub platform_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub last_collected: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    /// Fresh channel on first tracking request; display name defaults to the username.
    pub fn new(key: ChannelKey) -> Self {
        Self {
            display_name: key.username.clone(),
            key,
            platform_id: String::new(),
            avatar_url: None,
            category: None,
            follower_count: 0,
            is_live: false,
            last_collected: None,
            created_at: Utc::now(),
        }
    }
}

/// Point-in-time viewer/chatter observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSnapshot {
    pub viewer_count: u64,
    pub chatter_count: u64,
    #[serde(default)]
    pub category: Option<String>,
    pub collected_at: DateTime<Utc>,
}

impl ViewerSnapshot {
    pub fn new(viewer_count: u64, chatter_count: u64, collected_at: DateTime<Utc>) -> Self {
        Self {
            viewer_count,
            chatter_count,
            category: None,
            collected_at,
        }
    }
}

/// Summary of one chat-sampling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMetric {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub message_count: u64,
    pub unique_chatters: u64,
    /// Shannon entropy (bits) of exact-text repeats.
    pub message_entropy: f64,
    /// Distinct texts / total messages, in `[0, 1]`.
    pub unique_message_ratio: f64,
    /// Mean gap between consecutive messages, seconds.
    pub avg_time_between_msgs: f64,
}

impl ChatMetric {
    /// Canonical "no messages" record; every collector returns exactly this shape.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            window_start: at,
            window_end: at,
            message_count: 0,
            unique_chatters: 0,
            message_entropy: 0.0,
            unique_message_ratio: 0.0,
            avg_time_between_msgs: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message_count == 0
    }
}

/// Output of one signal. Not persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResult {
    /// Suspicion score in `[0, 100]`.
    pub score: f64,
    /// Trust in `score`, in `[0, 1]`.
    pub confidence: f64,
    /// Structured diagnostics (always a JSON object).
    pub details: serde_json::Value,
}

impl SignalResult {
    /// Build a result with score/confidence clamped to their declared ranges.
    /// Non-finite inputs collapse to 0.
    pub fn new(score: f64, confidence: f64, details: serde_json::Value) -> Self {
        Self {
            score: clamp_finite(score, 0.0, 100.0),
            confidence: clamp_finite(confidence, 0.0, 1.0),
            details,
        }
    }

    /// Score 0 with a `reason` explaining why the signal could not form an opinion.
    pub fn insufficient(reason: &str, confidence: f64) -> Self {
        Self::new(0.0, confidence, serde_json::json!({ "reason": reason }))
    }

    pub fn reason(&self) -> Option<&str> {
        self.details.get("reason").and_then(|v| v.as_str())
    }
}

/// Per-signal summary stored on an [`AnalysisResult`], in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub channel: ChannelKey,
    pub overall_score: f64,
    pub confidence: f64,
    pub signal_scores: Vec<SignalScore>,
    pub signal_details: BTreeMap<String, serde_json::Value>,
    pub data_points: usize,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn label(&self) -> &'static str {
        score_label(self.overall_score)
    }

    pub fn signal(&self, name: &str) -> Option<&SignalScore> {
        self.signal_scores.iter().find(|s| s.name == name)
    }
}

/// Human-readable band for a 0–100 suspicion score.
pub fn score_label(score: f64) -> &'static str {
    if score <= 20.0 {
        "Normal"
    } else if score <= 40.0 {
        "Low"
    } else if score <= 60.0 {
        "Moderate"
    } else if score <= 80.0 {
        "Elevated"
    } else {
        "High"
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(x: f64, places: i32) -> f64 {
    let m = 10f64.powi(places);
    (x * m).round() / m
}

pub(crate) fn clamp_finite(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_finite() {
        x.clamp(lo, hi)
    } else {
        0.0
    }
}
