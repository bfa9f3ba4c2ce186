//! # Analysis Engine
//! Runs every registered signal against one channel's history and folds the
//! results into a single [`AnalysisResult`]. No I/O besides reading the
//! (optionally hot-reloaded) weights.
//!
//! - `overall_score = Σ(sᵢ·wᵢ·cᵢ) / Σ(wᵢ·cᵢ)` over signals that ran; 0 if the
//!   denominator is 0.
//! - `confidence = Σ(cᵢ·wᵢ) / Σwᵢ` over *all* signals, failed ones counting
//!   with confidence 0, so failures pull the overall confidence down.
//! - A signal that returns `Err` or panics is recorded at score 0 /
//!   confidence 0 with `details.error` and never affects the others.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde_json::json;

use crate::model::{
    round_to, AnalysisResult, Channel, ChatMetric, SignalResult, SignalScore, ViewerSnapshot,
};
use crate::signals::{default_signals, Signal};
use crate::weights::{HotReloadWeights, SignalWeights};

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("analysis_runs_total", "Completed engine runs.");
        describe_counter!(
            "analysis_signal_failures_total",
            "Signals that errored or panicked (isolated)."
        );
        describe_histogram!(
            "analysis_overall_score",
            "Distribution of overall suspicion scores."
        );
    });
}

#[derive(Clone, Debug)]
enum WeightSource {
    Fixed(SignalWeights),
    Hot(Arc<HotReloadWeights>),
}

impl WeightSource {
    fn snapshot(&self) -> SignalWeights {
        match self {
            WeightSource::Fixed(w) => w.clone(),
            WeightSource::Hot(h) => h.current(),
        }
    }
}

#[derive(Clone)]
pub struct AnalysisEngine {
    signals: Vec<Arc<dyn Signal>>,
    weights: WeightSource,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(SignalWeights::default())
    }
}

impl AnalysisEngine {
    /// Default signal set with fixed weight overrides.
    pub fn new(weights: SignalWeights) -> Self {
        Self {
            signals: default_signals(),
            weights: WeightSource::Fixed(weights),
        }
    }

    /// Default signal set; weights are re-read from `hot` on every run.
    pub fn with_hot_weights(hot: Arc<HotReloadWeights>) -> Self {
        Self {
            signals: default_signals(),
            weights: WeightSource::Hot(hot),
        }
    }

    /// Replace the signal set (order is preserved in the output).
    pub fn with_signals(mut self, signals: Vec<Arc<dyn Signal>>) -> Self {
        self.signals = signals;
        self
    }

    pub fn signal_names(&self) -> Vec<&'static str> {
        self.signals.iter().map(|s| s.name()).collect()
    }

    /// Effective weight per signal for the current configuration.
    pub fn effective_weights(&self) -> Vec<(&'static str, f64)> {
        let w = self.weights.snapshot();
        self.signals
            .iter()
            .map(|s| (s.name(), w.weight_or(s.name(), s.default_weight())))
            .collect()
    }

    pub fn analyze(
        &self,
        channel: &Channel,
        snapshots: &[ViewerSnapshot],
        chat: &[ChatMetric],
    ) -> AnalysisResult {
        ensure_metrics_described();
        let weights = self.weights.snapshot();

        let mut signal_scores = Vec::with_capacity(self.signals.len());
        let mut signal_details = BTreeMap::new();
        let mut weighted_sum = 0.0;
        let mut denominator = 0.0;
        let mut confidence_sum = 0.0;
        let mut weight_sum = 0.0;

        for signal in &self.signals {
            let name = signal.name();
            let weight = weights.weight_or(name, signal.default_weight());

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                signal.calculate(snapshots, chat, channel)
            }));
            let result = match outcome {
                Ok(Ok(r)) => Some(r),
                Ok(Err(e)) => {
                    self.record_failure(channel, name, format!("{e:#}"));
                    signal_details.insert(name.to_string(), json!({ "error": format!("{e:#}") }));
                    None
                }
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    self.record_failure(channel, name, msg.clone());
                    signal_details.insert(name.to_string(), json!({ "error": msg }));
                    None
                }
            };

            match result {
                Some(SignalResult {
                    score,
                    confidence,
                    details,
                }) => {
                    weighted_sum += score * weight * confidence;
                    denominator += weight * confidence;
                    confidence_sum += confidence * weight;
                    signal_scores.push(SignalScore {
                        name: name.to_string(),
                        score,
                        weight,
                        confidence,
                    });
                    signal_details.insert(name.to_string(), details);
                }
                None => signal_scores.push(SignalScore {
                    name: name.to_string(),
                    score: 0.0,
                    weight,
                    confidence: 0.0,
                }),
            }
            weight_sum += weight;
        }

        let overall = if denominator > 0.0 {
            weighted_sum / denominator
        } else {
            0.0
        };
        let confidence = if weight_sum > 0.0 {
            confidence_sum / weight_sum
        } else {
            0.0
        };

        let result = AnalysisResult {
            channel: channel.key.clone(),
            overall_score: round_to(overall.clamp(0.0, 100.0), 2),
            confidence: round_to(confidence.clamp(0.0, 1.0), 2),
            signal_scores,
            signal_details,
            data_points: snapshots.len() + chat.len(),
            analyzed_at: Utc::now(),
        };

        counter!("analysis_runs_total").increment(1);
        histogram!("analysis_overall_score").record(result.overall_score);
        tracing::info!(
            target: "analysis",
            channel = %channel.key,
            score = result.overall_score,
            confidence = result.confidence,
            label = result.label(),
            data_points = result.data_points,
            "analysis complete"
        );
        result
    }

    fn record_failure(&self, channel: &Channel, signal: &'static str, error: String) {
        counter!("analysis_signal_failures_total", "signal" => signal).increment(1);
        tracing::error!(
            target: "analysis",
            channel = %channel.key,
            signal,
            error = %error,
            "signal failed"
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "signal panicked".to_string()
    }
}
