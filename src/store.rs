// src/store.rs
//! Persistence collaborator for channels, telemetry history and analyses.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::model::{AnalysisResult, Channel, ChannelKey, ChatMetric, ViewerSnapshot};

/// Histories returned by `recent_*` are ordered oldest-first.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn list_channels(&self) -> anyhow::Result<Vec<Channel>>;
    async fn get_channel(&self, key: &ChannelKey) -> anyhow::Result<Option<Channel>>;
    async fn upsert_channel(&self, channel: Channel) -> anyhow::Result<()>;

    async fn append_snapshot(&self, key: &ChannelKey, snap: ViewerSnapshot)
        -> anyhow::Result<()>;
    async fn append_chat_metric(&self, key: &ChannelKey, metric: ChatMetric)
        -> anyhow::Result<()>;

    async fn recent_snapshots(
        &self,
        key: &ChannelKey,
        limit: usize,
    ) -> anyhow::Result<Vec<ViewerSnapshot>>;
    async fn recent_chat_metrics(
        &self,
        key: &ChannelKey,
        limit: usize,
    ) -> anyhow::Result<Vec<ChatMetric>>;
    async fn snapshot_count(&self, key: &ChannelKey) -> anyhow::Result<usize>;

    async fn save_analysis(&self, result: AnalysisResult) -> anyhow::Result<()>;
    async fn latest_analysis(&self, key: &ChannelKey) -> anyhow::Result<Option<AnalysisResult>>;
}

pub const DEFAULT_HISTORY_CAP: usize = 2_000;

#[derive(Default)]
struct Inner {
    channels: BTreeMap<ChannelKey, Channel>,
    snapshots: BTreeMap<ChannelKey, VecDeque<ViewerSnapshot>>,
    chat: BTreeMap<ChannelKey, VecDeque<ChatMetric>>,
    analyses: BTreeMap<ChannelKey, AnalysisResult>,
}

/// In-process store with bounded per-channel history.
pub struct MemoryStore {
    cap: usize,
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

fn push_bounded<T>(q: &mut VecDeque<T>, item: T, cap: usize) {
    q.push_back(item);
    while q.len() > cap {
        q.pop_front();
    }
}

fn tail<T: Clone>(q: Option<&VecDeque<T>>, limit: usize) -> Vec<T> {
    match q {
        Some(q) => q.iter().skip(q.len().saturating_sub(limit)).cloned().collect(),
        None => Vec::new(),
    }
}

impl MemoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn list_channels(&self) -> anyhow::Result<Vec<Channel>> {
        Ok(self.lock().channels.values().cloned().collect())
    }

    async fn get_channel(&self, key: &ChannelKey) -> anyhow::Result<Option<Channel>> {
        Ok(self.lock().channels.get(key).cloned())
    }

    async fn upsert_channel(&self, channel: Channel) -> anyhow::Result<()> {
        self.lock().channels.insert(channel.key.clone(), channel);
        Ok(())
    }

    async fn append_snapshot(
        &self,
        key: &ChannelKey,
        snap: ViewerSnapshot,
    ) -> anyhow::Result<()> {
        let cap = self.cap;
        let mut g = self.lock();
        push_bounded(g.snapshots.entry(key.clone()).or_default(), snap, cap);
        Ok(())
    }

    async fn append_chat_metric(
        &self,
        key: &ChannelKey,
        metric: ChatMetric,
    ) -> anyhow::Result<()> {
        let cap = self.cap;
        let mut g = self.lock();
        push_bounded(g.chat.entry(key.clone()).or_default(), metric, cap);
        Ok(())
    }

    async fn recent_snapshots(
        &self,
        key: &ChannelKey,
        limit: usize,
    ) -> anyhow::Result<Vec<ViewerSnapshot>> {
        Ok(tail(self.lock().snapshots.get(key), limit))
    }

    async fn recent_chat_metrics(
        &self,
        key: &ChannelKey,
        limit: usize,
    ) -> anyhow::Result<Vec<ChatMetric>> {
        Ok(tail(self.lock().chat.get(key), limit))
    }

    async fn snapshot_count(&self, key: &ChannelKey) -> anyhow::Result<usize> {
        Ok(self.lock().snapshots.get(key).map_or(0, VecDeque::len))
    }

    async fn save_analysis(&self, result: AnalysisResult) -> anyhow::Result<()> {
        self.lock().analyses.insert(result.channel.clone(), result);
        Ok(())
    }

    async fn latest_analysis(&self, key: &ChannelKey) -> anyhow::Result<Option<AnalysisResult>> {
        Ok(self.lock().analyses.get(key).cloned())
    }
}
