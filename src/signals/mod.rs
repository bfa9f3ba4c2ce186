//! # Signals
//! Independent statistical detectors for inflated audience metrics.
//!
//! - Every signal is pure: same histories in, same [`SignalResult`] out.
//! - Histories are ordered oldest-first by `collected_at` / `window_start`.
//! - Insufficient input is never an error: score 0, a low confidence and a
//!   `details.reason` string.
//! - `Err` is reserved for contract violations; the engine isolates it.

pub mod benford;
pub mod chat_entropy;
pub mod cvr;
pub mod follower_ratio;
pub mod growth;
pub mod stats;
pub mod step_function;
pub mod temporal;

use std::sync::Arc;

use crate::model::{Channel, ChatMetric, SignalResult, ViewerSnapshot};

pub use benford::BenfordSignal;
pub use chat_entropy::ChatEntropySignal;
pub use cvr::CvrSignal;
pub use follower_ratio::FollowerRatioSignal;
pub use growth::GrowthSignal;
pub use step_function::StepFunctionSignal;
pub use temporal::TemporalSignal;

pub trait Signal: Send + Sync {
    /// Stable identifier, also the key in the weights file.
    fn name(&self) -> &'static str;

    /// Weight used when configuration does not override it.
    fn default_weight(&self) -> f64;

    fn calculate(
        &self,
        snapshots: &[ViewerSnapshot],
        chat: &[ChatMetric],
        channel: &Channel,
    ) -> anyhow::Result<SignalResult>;
}

/// The fixed, ordered signal set.
pub fn default_signals() -> Vec<Arc<dyn Signal>> {
    vec![
        Arc::new(CvrSignal),
        Arc::new(StepFunctionSignal),
        Arc::new(ChatEntropySignal),
        Arc::new(FollowerRatioSignal),
        Arc::new(GrowthSignal),
        Arc::new(BenfordSignal),
        Arc::new(TemporalSignal),
    ]
}

/// Viewer counts above zero, in history order.
pub(crate) fn positive_viewers(snapshots: &[ViewerSnapshot]) -> Vec<f64> {
    snapshots
        .iter()
        .filter(|s| s.viewer_count > 0)
        .map(|s| s.viewer_count as f64)
        .collect()
}
