// src/config/mod.rs
pub mod app;
pub mod credentials;

pub use app::{AnalyzeConfig, AppConfig, ChannelSeed, CollectConfig, MetricsConfig};
pub use credentials::PlatformCredentials;
