// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod collect;
pub mod config;
pub mod engine;
pub mod exporter;
pub mod model;
pub mod rate_limiter;
pub mod scheduler;
pub mod signals;
pub mod store;
pub mod weights;

// ---- Re-exports for stable public API ----
pub use crate::collect::{Collector, CollectorError, CollectorRegistry};
pub use crate::engine::AnalysisEngine;
pub use crate::model::{
    score_label, AnalysisResult, Channel, ChannelKey, ChatMetric, Platform, SignalResult,
    ViewerSnapshot,
};
pub use crate::rate_limiter::RateLimiter;
pub use crate::scheduler::{spawn_scheduler, Pipeline};
pub use crate::store::{MemoryStore, TelemetryStore};
