//! # Collection and analysis cycles
//!
//! - [`Pipeline::collect_all`]: one viewer snapshot per tracked channel, plus
//!   a chat window while live. A quota error skips that platform for the rest
//!   of the cycle.
//! - [`Pipeline::analyze_all`]: runs the engine for channels with enough
//!   history and stores the result.
//! - [`spawn_scheduler`]: both cycles on independent interval tickers.
//!
//! Channels are processed sequentially; one channel's failure is logged and
//! never aborts the batch.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use metrics::{counter, gauge};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::collect::{ensure_metrics_described, CollectorError, CollectorRegistry};
use crate::collect::types::{ChannelInfo, Collector};
use crate::config::{AnalyzeConfig, CollectConfig};
use crate::engine::AnalysisEngine;
use crate::model::{AnalysisResult, Channel, ChannelKey, Platform, ViewerSnapshot};
use crate::store::TelemetryStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    pub channels: usize,
    pub snapshots: usize,
    pub chat_windows: usize,
    pub errors: usize,
    pub quota_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzeReport {
    pub analyzed: usize,
    /// Channels below the minimum snapshot count.
    pub skipped: usize,
    pub errors: usize,
}

/// Everything the cycles need, shared between the two tickers.
pub struct Pipeline {
    registry: CollectorRegistry,
    store: Arc<dyn TelemetryStore>,
    engine: AnalysisEngine,
    collect: CollectConfig,
    analyze: AnalyzeConfig,
}

fn is_quota(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CollectorError>()
        .is_some_and(CollectorError::is_quota)
}

fn apply_info(channel: &mut Channel, info: ChannelInfo) {
    if !info.platform_id.is_empty() {
        channel.platform_id = info.platform_id;
    }
    if !info.display_name.is_empty() {
        channel.display_name = info.display_name;
    }
    if info.avatar_url.is_some() {
        channel.avatar_url = info.avatar_url;
    }
    if info.category.is_some() {
        channel.category = info.category;
    }
    channel.follower_count = info.follower_count;
}

impl Pipeline {
    pub fn new(
        registry: CollectorRegistry,
        store: Arc<dyn TelemetryStore>,
        engine: AnalysisEngine,
    ) -> Self {
        Self {
            registry,
            store,
            engine,
            collect: CollectConfig::default(),
            analyze: AnalyzeConfig::default(),
        }
    }

    pub fn with_config(mut self, collect: CollectConfig, analyze: AnalyzeConfig) -> Self {
        self.collect = collect;
        self.analyze = analyze;
        self
    }

    pub fn store(&self) -> &Arc<dyn TelemetryStore> {
        &self.store
    }

    fn collector(&self, platform: Platform) -> Result<Arc<dyn Collector>> {
        self.registry
            .get(platform)
            .ok_or_else(|| anyhow!("no collector registered for {platform}"))
    }

    /// Start tracking a channel (idempotent) and collect it once right away.
    pub async fn track_channel(&self, platform: Platform, username: &str) -> Result<Channel> {
        let username = username.trim();
        anyhow::ensure!(!username.is_empty(), "username must not be empty");
        let key = ChannelKey::new(platform, username);

        if self.store.get_channel(&key).await?.is_none() {
            self.store
                .upsert_channel(Channel::new(key.clone()))
                .await
                .context("creating channel")?;
            tracing::info!(target: "collect", channel = %key, "tracking new channel");
        }

        if let Err(e) = self.collect_channel_on_demand(&key).await {
            tracing::error!(target: "collect", channel = %key, error = %e, "on-demand collection failed");
        }

        self.store
            .get_channel(&key)
            .await?
            .ok_or_else(|| anyhow!("channel {key} vanished"))
    }

    /// Channel metadata plus one viewer snapshot.
    pub async fn collect_channel_on_demand(&self, key: &ChannelKey) -> Result<()> {
        ensure_metrics_described();
        let collector = self.collector(key.platform)?;
        let Some(mut channel) = self.store.get_channel(key).await? else {
            return Ok(());
        };

        if let Some(info) = collector.collect_channel_info(&key.username).await? {
            apply_info(&mut channel, info);
        }
        self.record_snapshot(collector.as_ref(), &mut channel).await?;

        channel.last_collected = Some(Utc::now());
        self.store.upsert_channel(channel).await
    }

    async fn record_snapshot(&self, collector: &dyn Collector, channel: &mut Channel) -> Result<()> {
        let status = collector.collect_viewers(&channel.key.username).await?;
        channel.is_live = status.is_live;
        let mut snap = ViewerSnapshot::new(status.viewer_count, status.chatter_count, Utc::now());
        snap.category = status.category;
        self.store
            .append_snapshot(&channel.key, snap)
            .await
            .context("storing snapshot")?;
        counter!("collect_snapshots_total", "platform" => channel.key.platform.as_str())
            .increment(1);
        Ok(())
    }

    /// Returns whether a chat window was stored.
    async fn collect_one(&self, collector: &dyn Collector, channel: &mut Channel) -> Result<bool> {
        self.record_snapshot(collector, channel).await?;

        let mut stored_chat = false;
        if channel.is_live {
            let window = Duration::from_secs(self.collect.chat_window_secs);
            let metric = collector
                .collect_chat_metrics(&channel.key.username, window)
                .await?;
            if !metric.is_empty() {
                self.store
                    .append_chat_metric(&channel.key, metric)
                    .await
                    .context("storing chat metric")?;
                counter!("collect_chat_windows_total", "platform" => channel.key.platform.as_str())
                    .increment(1);
                stored_chat = true;
            }
        }

        channel.last_collected = Some(Utc::now());
        self.store.upsert_channel(channel.clone()).await?;
        Ok(stored_chat)
    }

    pub async fn collect_all(&self) -> Result<CollectReport> {
        ensure_metrics_described();
        tracing::info!(target: "collect", "collection run started");
        let channels = self.store.list_channels().await.context("listing channels")?;

        let mut report = CollectReport {
            channels: channels.len(),
            ..Default::default()
        };
        let mut exhausted: BTreeSet<Platform> = BTreeSet::new();

        for mut channel in channels {
            let platform = channel.key.platform;
            if exhausted.contains(&platform) {
                report.quota_skipped += 1;
                counter!("collect_quota_skips_total", "platform" => platform.as_str()).increment(1);
                continue;
            }
            let collector = match self.collector(platform) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(target: "collect", channel = %channel.key, error = %e, "skipping channel");
                    report.errors += 1;
                    continue;
                }
            };

            match self.collect_one(collector.as_ref(), &mut channel).await {
                Ok(stored_chat) => {
                    report.snapshots += 1;
                    report.chat_windows += usize::from(stored_chat);
                    tracing::debug!(target: "collect", channel = %channel.key, live = channel.is_live, "collected");
                }
                Err(e) if is_quota(&e) => {
                    tracing::warn!(target: "collect", %platform, "quota exhausted; skipping platform for this run");
                    exhausted.insert(platform);
                    report.quota_skipped += 1;
                    counter!("collect_quota_skips_total", "platform" => platform.as_str())
                        .increment(1);
                }
                Err(e) => {
                    tracing::error!(target: "collect", channel = %channel.key, error = %e, "collection failed");
                    report.errors += 1;
                    counter!("collect_channel_errors_total", "platform" => platform.as_str())
                        .increment(1);
                }
            }
        }

        counter!("collect_runs_total").increment(1);
        gauge!("collect_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
        tracing::info!(
            target: "collect",
            channels = report.channels,
            snapshots = report.snapshots,
            chat_windows = report.chat_windows,
            errors = report.errors,
            quota_skipped = report.quota_skipped,
            "collection run complete"
        );
        Ok(report)
    }

    /// Analyze one channel if it has enough history.
    pub async fn analyze_channel(&self, channel: &Channel) -> Result<Option<AnalysisResult>> {
        let key = &channel.key;
        if self.store.snapshot_count(key).await? < self.analyze.min_snapshots {
            return Ok(None);
        }
        let snapshots = self
            .store
            .recent_snapshots(key, self.analyze.snapshot_limit)
            .await?;
        let chat = self
            .store
            .recent_chat_metrics(key, self.analyze.chat_limit)
            .await?;

        let result = self.engine.analyze(channel, &snapshots, &chat);
        self.store
            .save_analysis(result.clone())
            .await
            .context("saving analysis")?;
        Ok(Some(result))
    }

    pub async fn analyze_all(&self) -> Result<AnalyzeReport> {
        tracing::info!(target: "analysis", "analysis run started");
        let channels = self.store.list_channels().await.context("listing channels")?;
        let mut report = AnalyzeReport::default();

        for channel in &channels {
            match self.analyze_channel(channel).await {
                Ok(Some(_)) => report.analyzed += 1,
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(target: "analysis", channel = %channel.key, error = %e, "analysis failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            target: "analysis",
            analyzed = report.analyzed,
            skipped = report.skipped,
            errors = report.errors,
            "analysis run complete"
        );
        Ok(report)
    }
}

/// Spawn both cycles. The first tick of each fires immediately.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>) -> (JoinHandle<()>, JoinHandle<()>) {
    let collect_every = Duration::from_secs(pipeline.collect.interval_secs.max(1));
    let analyze_every = Duration::from_secs(pipeline.analyze.interval_secs.max(1));
    tracing::info!(
        collect_secs = collect_every.as_secs(),
        analyze_secs = analyze_every.as_secs(),
        "scheduler started"
    );

    let p = Arc::clone(&pipeline);
    let collect = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(collect_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = p.collect_all().await {
                tracing::error!(target: "collect", error = %e, "collection run failed");
            }
        }
    });

    let p = pipeline;
    let analyze = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(analyze_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = p.analyze_all().await {
                tracing::error!(target: "analysis", error = %e, "analysis run failed");
            }
        }
    });

    (collect, analyze)
}
