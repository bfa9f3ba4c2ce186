// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{ChannelKey, Platform};

pub const CONFIG_PATH_ENV: &str = "STREAM_ORACLE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/stream_oracle.toml";

fn default_collect_interval() -> u64 {
    300
}
fn default_chat_window() -> u64 {
    30
}
fn default_analyze_interval() -> u64 {
    1800
}
fn default_min_snapshots() -> usize {
    3
}
fn default_snapshot_limit() -> usize {
    500
}
fn default_chat_limit() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Seconds between collection cycles.
    #[serde(default = "default_collect_interval")]
    pub interval_secs: u64,
    /// Length of each live chat sample.
    #[serde(default = "default_chat_window")]
    pub chat_window_secs: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_collect_interval(),
            chat_window_secs: default_chat_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    #[serde(default = "default_analyze_interval")]
    pub interval_secs: u64,
    /// Channels with fewer snapshots are not analyzed yet.
    #[serde(default = "default_min_snapshots")]
    pub min_snapshots: usize,
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
    #[serde(default = "default_chat_limit")]
    pub chat_limit: usize,
    /// Weights JSON; `None` means `$SIGNAL_WEIGHTS_PATH` or the default path.
    pub weights_path: Option<PathBuf>,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_analyze_interval(),
            min_snapshots: default_min_snapshots(),
            snapshot_limit: default_snapshot_limit(),
            chat_limit: default_chat_limit(),
            weights_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// `host:port` for the Prometheus listener; disabled when absent.
    pub listen: Option<String>,
}

/// A channel to start tracking at boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub platform: Platform,
    pub username: String,
}

impl ChannelSeed {
    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.platform, self.username.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collect: CollectConfig,
    pub analyze: AnalyzeConfig,
    pub metrics: MetricsConfig,
    pub channels: Vec<ChannelSeed>,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing app config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $STREAM_ORACLE_CONFIG (must exist)
    /// 2) config/stream_oracle.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{CONFIG_PATH_ENV} points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    /// Zero intervals would spin the scheduler; drop blank seeds.
    fn sanitize(&mut self) {
        if self.collect.interval_secs == 0 {
            self.collect.interval_secs = default_collect_interval();
        }
        if self.collect.chat_window_secs == 0 {
            self.collect.chat_window_secs = default_chat_window();
        }
        if self.analyze.interval_secs == 0 {
            self.analyze.interval_secs = default_analyze_interval();
        }
        self.channels.retain(|c| !c.username.trim().is_empty());
    }
}
