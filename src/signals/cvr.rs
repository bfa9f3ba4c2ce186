//! Chatter-to-viewer ratio.
//!
//! Organic channels usually have 5–20% of viewers chatting; a ratio far
//! below that suggests viewers who never talk.

use serde_json::json;

use super::Signal;
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

/// Typical share of viewers that chat.
pub const BASELINE: f64 = 0.12;
const BASELINE_STD: f64 = 0.05;

pub struct CvrSignal;

impl CvrSignal {
    /// Piecewise-linear score for an average chatter/viewer ratio.
    pub fn score_for(avg: f64) -> f64 {
        if avg >= 0.05 {
            0.0
        } else if avg >= 0.02 {
            (0.05 - avg) / 0.03 * 50.0
        } else if avg >= 0.005 {
            50.0 + (0.02 - avg) / 0.015 * 30.0
        } else {
            80.0 + f64::min(20.0, (0.005 - avg) / 0.005 * 20.0)
        }
    }
}

impl Signal for CvrSignal {
    fn name(&self) -> &'static str {
        "cvr"
    }

    fn default_weight(&self) -> f64 {
        0.25
    }

    fn calculate(
        &self,
        snapshots: &[ViewerSnapshot],
        _chat: &[ChatMetric],
        _channel: &Channel,
    ) -> anyhow::Result<SignalResult> {
        if snapshots.is_empty() {
            return Ok(SignalResult::insufficient("no data", 0.0));
        }

        let ratios: Vec<f64> = snapshots
            .iter()
            .filter(|s| s.viewer_count > 0 && s.chatter_count > 0)
            .map(|s| s.chatter_count as f64 / s.viewer_count as f64)
            .collect();
        if ratios.is_empty() {
            return Ok(SignalResult::insufficient("no chatter data", 0.1));
        }

        let avg = super::stats::mean(&ratios);
        let z = (BASELINE - avg) / BASELINE_STD;
        let score = Self::score_for(avg).clamp(0.0, 100.0);
        let confidence = f64::min(1.0, ratios.len() as f64 / 10.0);

        Ok(SignalResult::new(
            round_to(score, 2),
            round_to(confidence, 2),
            json!({
                "avg_cvr": round_to(avg, 4),
                "baseline": BASELINE,
                "z_score": round_to(z, 2),
                "data_points": ratios.len(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelKey, Platform};
    use chrono::Utc;

    fn chan() -> Channel {
        Channel::new(ChannelKey::new(Platform::Twitch, "x"))
    }

    fn snaps(pairs: &[(u64, u64)]) -> Vec<ViewerSnapshot> {
        pairs
            .iter()
            .map(|&(v, c)| ViewerSnapshot::new(v, c, Utc::now()))
            .collect()
    }

    #[test]
    fn empty_history_has_zero_confidence() {
        let r = CvrSignal.calculate(&[], &[], &chan()).unwrap();
        assert_eq!((r.score, r.confidence), (0.0, 0.0));
        assert_eq!(r.reason(), Some("no data"));
    }

    #[test]
    fn no_chatters_is_low_confidence() {
        let r = CvrSignal
            .calculate(&snaps(&[(100, 0), (0, 5)]), &[], &chan())
            .unwrap();
        assert_eq!((r.score, r.confidence), (0.0, 0.1));
        assert_eq!(r.reason(), Some("no chatter data"));
    }

    #[test]
    fn healthy_ratio_scores_zero() {
        let r = CvrSignal
            .calculate(&snaps(&[(1000, 120); 10]), &[], &chan())
            .unwrap();
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.details["avg_cvr"], 0.12);
        assert_eq!(r.details["z_score"], 0.0);
    }

    #[test]
    fn breakpoints_interpolate() {
        assert_eq!(CvrSignal::score_for(0.05), 0.0);
        assert!((CvrSignal::score_for(0.02) - 50.0).abs() < 1e-9);
        assert!((CvrSignal::score_for(0.005) - 80.0).abs() < 1e-9);
        assert!((CvrSignal::score_for(0.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_ratio_is_high() {
        // 1 chatter per 1000 viewers.
        let r = CvrSignal
            .calculate(&snaps(&[(1000, 1); 5]), &[], &chan())
            .unwrap();
        assert_eq!(r.score, 96.0);
        assert_eq!(r.confidence, 0.5);
    }
}
