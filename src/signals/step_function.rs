//! Sharp, unnatural jumps in viewer counts.
//!
//! A point is a step when it differs from the rolling mean of the previous
//! [`WINDOW`] points by more than 15% *and* by more than 3 rolling σ.

use serde_json::{json, Value};

use super::stats::{mean, sample_stdev};
use super::{positive_viewers, Signal};
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

pub const WINDOW: usize = 6;
const JUMP_THRESHOLD: f64 = 0.15;
const SIGMA_THRESHOLD: f64 = 3.0;
const MAX_EXAMPLES: usize = 5;

pub struct StepFunctionSignal;

#[derive(Debug, Clone, Copy)]
struct Step {
    index: usize,
    pct_change: f64,
    z: f64,
    from_mean: f64,
    to_value: f64,
}

impl Step {
    fn to_json(self) -> Value {
        json!({
            "index": self.index,
            "pct_change": round_to(self.pct_change, 4),
            "z_score": round_to(self.z, 2),
            "from_mean": round_to(self.from_mean, 0),
            "to_value": self.to_value as u64,
        })
    }
}

fn detect_steps(counts: &[f64]) -> Vec<Step> {
    let mut steps = Vec::new();
    for i in WINDOW..counts.len() {
        let window = &counts[i - WINDOW..i];
        let current = counts[i];
        let m = mean(window);
        if m == 0.0 {
            continue;
        }
        let std = sample_stdev(window);
        let diff = (current - m).abs();
        let pct_change = diff / m;
        let z = if std > 0.0 { diff / std } else { 0.0 };
        if pct_change > JUMP_THRESHOLD && z > SIGMA_THRESHOLD {
            steps.push(Step {
                index: i,
                pct_change,
                z,
                from_mean: m,
                to_value: current,
            });
        }
    }
    steps
}

impl Signal for StepFunctionSignal {
    fn name(&self) -> &'static str {
        "step_function"
    }

    fn default_weight(&self) -> f64 {
        0.20
    }

    fn calculate(
        &self,
        snapshots: &[ViewerSnapshot],
        _chat: &[ChatMetric],
        _channel: &Channel,
    ) -> anyhow::Result<SignalResult> {
        let counts = positive_viewers(snapshots);
        if counts.len() < WINDOW + 1 {
            return Ok(SignalResult::insufficient("insufficient data", 0.1));
        }

        let steps = detect_steps(&counts);
        let total_windows = counts.len() - WINDOW;
        let frequency = steps.len() as f64 / total_windows as f64;

        let score = if steps.is_empty() {
            0.0
        } else {
            // Magnitude uses the same 4-dp values reported in `examples`.
            let avg_magnitude = steps
                .iter()
                .map(|s| round_to(s.pct_change, 4))
                .sum::<f64>()
                / steps.len() as f64;
            f64::min(100.0, frequency * 200.0 + avg_magnitude * 100.0)
        };
        let confidence = f64::min(1.0, counts.len() as f64 / 20.0);

        let examples: Vec<Value> = steps
            .iter()
            .take(MAX_EXAMPLES)
            .map(|s| s.to_json())
            .collect();

        Ok(SignalResult::new(
            round_to(score.clamp(0.0, 100.0), 2),
            round_to(confidence, 2),
            json!({
                "steps_detected": steps.len(),
                "step_frequency": round_to(frequency, 4),
                "total_windows": total_windows,
                "examples": examples,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelKey, Platform};
    use chrono::Utc;

    fn run(counts: &[u64]) -> SignalResult {
        let snaps: Vec<_> = counts
            .iter()
            .map(|&v| ViewerSnapshot::new(v, 0, Utc::now()))
            .collect();
        let ch = Channel::new(ChannelKey::new(Platform::Kick, "x"));
        StepFunctionSignal.calculate(&snaps, &[], &ch).unwrap()
    }

    #[test]
    fn too_few_points() {
        let r = run(&[100; 6]);
        assert_eq!((r.score, r.confidence), (0.0, 0.1));
        assert_eq!(r.reason(), Some("insufficient data"));
    }

    #[test]
    fn flat_series_has_no_steps() {
        let r = run(&[500; 20]);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.details["steps_detected"], 0);
        assert_eq!(r.details["total_windows"], 14);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn tripled_point_is_a_step() {
        let r = run(&[100, 101, 99, 100, 102, 98, 300]);
        assert_eq!(r.details["steps_detected"], 1);
        assert_eq!(r.details["total_windows"], 1);
        let ex = &r.details["examples"][0];
        assert_eq!(ex["index"], 6);
        assert_eq!(ex["pct_change"], 2.0);
        assert_eq!(ex["from_mean"], 100.0);
        assert_eq!(ex["to_value"], 300);
        // frequency 1.0 * 200 + magnitude 2.0 * 100, capped.
        assert_eq!(r.score, 100.0);
        assert_eq!(r.confidence, 0.35);
    }

    #[test]
    fn zero_viewer_snapshots_are_ignored() {
        let r = run(&[0, 0, 0, 100, 100, 100, 100, 100, 100]);
        assert_eq!(r.reason(), Some("insufficient data"));
    }
}
