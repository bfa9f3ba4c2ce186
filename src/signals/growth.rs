//! Viewer/chatter growth correlation.
//!
//! Organic audiences grow together with chat (r > 0.7). Bots add viewers
//! without adding chatters, or arrive in erratic jumps.

use serde_json::json;

use super::stats::{mean, pearson};
use super::Signal;
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

const MIN_PAIRS: usize = 5;
/// Average absolute viewer change between snapshots considered erratic.
const VOLATILITY_LIMIT: f64 = 0.5;
const VOLATILITY_PENALTY: f64 = 15.0;

pub struct GrowthSignal;

impl GrowthSignal {
    pub fn score_for(correlation: f64) -> f64 {
        if correlation >= 0.7 {
            0.0
        } else if correlation >= 0.4 {
            (0.7 - correlation) / 0.3 * 50.0
        } else if correlation >= 0.0 {
            50.0 + (0.4 - correlation) / 0.4 * 30.0
        } else {
            80.0 + f64::min(20.0, correlation.abs() * 20.0)
        }
    }
}

fn mean_abs_change(viewers: &[f64]) -> Option<f64> {
    let changes: Vec<f64> = viewers
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| ((w[1] - w[0]) / w[0]).abs())
        .collect();
    (!changes.is_empty()).then(|| mean(&changes))
}

impl Signal for GrowthSignal {
    fn name(&self) -> &'static str {
        "growth"
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
        let (viewers, chatters): (Vec<f64>, Vec<f64>) = snapshots
            .iter()
            .filter(|s| s.viewer_count > 0 && s.chatter_count > 0)
            .map(|s| (s.viewer_count as f64, s.chatter_count as f64))
            .unzip();
        if viewers.len() < MIN_PAIRS {
            return Ok(SignalResult::insufficient("insufficient paired data", 0.1));
        }

        let correlation = pearson(&viewers, &chatters);
        let mut score = Self::score_for(correlation);

        if viewers.len() >= 3 {
            if let Some(swing) = mean_abs_change(&viewers) {
                if swing > VOLATILITY_LIMIT {
                    score = f64::min(100.0, score + VOLATILITY_PENALTY);
                }
            }
        }
        let confidence = f64::min(1.0, viewers.len() as f64 / 15.0);

        Ok(SignalResult::new(
            round_to(score.clamp(0.0, 100.0), 2),
            round_to(confidence, 2),
            json!({
                "correlation": round_to(correlation, 4),
                "data_points": viewers.len(),
                "avg_viewers": round_to(mean(&viewers), 0),
                "avg_chatters": round_to(mean(&chatters), 0),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelKey, Platform};
    use chrono::Utc;

    fn run(pairs: &[(u64, u64)]) -> SignalResult {
        let snaps: Vec<_> = pairs
            .iter()
            .map(|&(v, c)| ViewerSnapshot::new(v, c, Utc::now()))
            .collect();
        let ch = Channel::new(ChannelKey::new(Platform::Twitch, "x"));
        GrowthSignal.calculate(&snaps, &[], &ch).unwrap()
    }

    #[test]
    fn needs_five_pairs() {
        let r = run(&[(100, 10), (200, 20), (300, 30), (400, 40), (500, 0)]);
        assert_eq!(r.reason(), Some("insufficient paired data"));
        assert_eq!(r.confidence, 0.1);
    }

    #[test]
    fn proportional_chat_is_clean() {
        let pairs: Vec<_> = (0..5).map(|i| (1000 + i * 100, 100 + i * 10)).collect();
        let r = run(&pairs);
        assert_eq!(r.details["correlation"], 1.0);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 0.33);
    }

    #[test]
    fn anti_correlated_chat_is_suspicious() {
        let pairs: Vec<_> = (0..5).map(|i| (1000 + i * 100, 50 - i * 10)).collect();
        let r = run(&pairs);
        assert_eq!(r.details["correlation"], -1.0);
        assert!(r.score >= 80.0, "{}", r.score);
    }

    #[test]
    fn erratic_viewers_add_penalty() {
        // Correlated, but viewers swing by 100%+ each step.
        let r = run(&[(100, 10), (300, 30), (100, 10), (300, 30), (100, 10)]);
        assert_eq!(r.details["correlation"], 1.0);
        assert_eq!(r.score, 15.0);
    }
}
