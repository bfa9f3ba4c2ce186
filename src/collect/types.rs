// src/collect/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::collect::error::CollectorError;
use crate::model::{ChatMetric, Platform};

/// Normalized channel metadata as reported upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub platform: Platform,
    pub platform_id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub category: Option<String>,
    pub follower_count: u64,
}

/// Current viewer/chatter counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub viewer_count: u64,
    pub chatter_count: u64,
    pub is_live: bool,
    pub category: Option<String>,
}

impl LiveStatus {
    /// Offline (or unknown) channel: zero counts, not an error.
    pub fn offline() -> Self {
        Self {
            viewer_count: 0,
            chatter_count: 0,
            is_live: false,
            category: None,
        }
    }

    pub fn live(viewer_count: u64, chatter_count: u64, category: Option<String>) -> Self {
        Self {
            viewer_count,
            chatter_count,
            is_live: true,
            category,
        }
    }
}

/// One platform's telemetry source.
///
/// Absence (offline, unknown channel, missing credentials, blocked) is reported
/// through empty records; only quota exhaustion and transport faults are errors.
#[async_trait]
pub trait Collector: Send + Sync {
    fn platform(&self) -> Platform;

    /// `Ok(None)` when the channel does not exist upstream.
    async fn collect_channel_info(&self, username: &str)
        -> Result<Option<ChannelInfo>, CollectorError>;

    async fn collect_viewers(&self, username: &str) -> Result<LiveStatus, CollectorError>;

    /// Sample live chat for `duration` and reduce it to a [`ChatMetric`].
    async fn collect_chat_metrics(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<ChatMetric, CollectorError>;
}
