// src/collect/mod.rs
pub mod chat;
pub mod credentials;
pub mod error;
pub(crate) mod http;
pub mod providers;
pub mod quota;
pub mod types;

pub use error::CollectorError;
pub use providers::CollectorRegistry;
pub use types::{ChannelInfo, Collector, LiveStatus};

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_runs_total", "Completed collection cycles.");
        describe_counter!(
            "collect_channel_errors_total",
            "Per-channel collection failures (logged and skipped)."
        );
        describe_counter!(
            "collect_quota_skips_total",
            "Channels skipped because their platform quota is exhausted."
        );
        describe_counter!("collect_snapshots_total", "Viewer snapshots persisted.");
        describe_counter!(
            "collect_chat_windows_total",
            "Non-empty chat windows persisted."
        );
        describe_counter!(
            "collect_http_requests_total",
            "Outbound platform API requests (after rate limiting)."
        );
        describe_counter!(
            "collect_blocked_total",
            "Requests answered with 403 and degraded to empty."
        );
        describe_gauge!(
            "collect_last_run_ts",
            "Unix ts when the collection cycle last ran."
        );
    });
}
