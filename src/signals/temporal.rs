//! Flatness of viewer counts across hours of the day.
//!
//! Real audiences rise and fall with the clock (CV of hourly means > 0.3);
//! a nearly constant curve (CV < 0.2) is suspicious.

use std::collections::BTreeMap;

use chrono::Timelike;
use serde_json::json;

use super::stats::{mean, sample_stdev};
use super::Signal;
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

const MIN_SNAPSHOTS: usize = 10;
const MIN_HOURS: usize = 3;

pub struct TemporalSignal;

impl TemporalSignal {
    pub fn score_for(cv: f64) -> f64 {
        if cv >= 0.3 {
            0.0
        } else if cv >= 0.2 {
            (0.3 - cv) / 0.1 * 50.0
        } else if cv >= 0.1 {
            50.0 + (0.2 - cv) / 0.1 * 30.0
        } else {
            80.0 + f64::min(20.0, (0.1 - cv) / 0.1 * 20.0)
        }
    }
}

impl Signal for TemporalSignal {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn default_weight(&self) -> f64 {
        0.10
    }

    fn calculate(
        &self,
        snapshots: &[ViewerSnapshot],
        _chat: &[ChatMetric],
        _channel: &Channel,
    ) -> anyhow::Result<SignalResult> {
        if snapshots.len() < MIN_SNAPSHOTS {
            return Ok(SignalResult::insufficient("insufficient data", 0.1));
        }

        let mut hourly: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for s in snapshots.iter().filter(|s| s.viewer_count > 0) {
            hourly
                .entry(s.collected_at.hour())
                .or_default()
                .push(s.viewer_count as f64);
        }
        if hourly.len() < MIN_HOURS {
            return Ok(SignalResult::insufficient("need data across multiple hours", 0.1));
        }

        let hourly_means: Vec<f64> = hourly.values().map(|v| mean(v)).collect();
        if hourly_means.len() < 2 {
            return Ok(SignalResult::insufficient("insufficient hourly data", 0.1));
        }

        let m = mean(&hourly_means);
        let std = sample_stdev(&hourly_means);
        let cv = if m > 0.0 { std / m } else { 0.0 };
        let score = Self::score_for(cv);
        let confidence = f64::min(1.0, snapshots.len() as f64 / 30.0);

        Ok(SignalResult::new(
            round_to(score.clamp(0.0, 100.0), 2),
            round_to(confidence, 2),
            json!({
                "coefficient_of_variation": round_to(cv, 4),
                "hourly_mean": round_to(m, 0),
                "hourly_std": round_to(std, 2),
                "hours_covered": hourly.len(),
                "total_snapshots": snapshots.len(),
            }),
        ))
    }
}
