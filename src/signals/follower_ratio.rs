//! Concurrent viewers relative to follower count.

use serde_json::json;

use super::stats::mean;
use super::{positive_viewers, Signal};
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

pub struct FollowerRatioSignal;

impl FollowerRatioSignal {
    pub fn score_for(ratio: f64) -> f64 {
        if ratio > 1.0 {
            f64::min(100.0, 60.0 + (ratio - 1.0) * 40.0)
        } else if ratio > 0.5 {
            (ratio - 0.5) / 0.5 * 40.0 + 20.0
        } else if ratio > 0.2 {
            (ratio - 0.2) / 0.3 * 20.0
        } else {
            0.0
        }
    }
}

impl Signal for FollowerRatioSignal {
    fn name(&self) -> &'static str {
        "follower_ratio"
    }

    fn default_weight(&self) -> f64 {
        0.10
    }

    fn calculate(
        &self,
        snapshots: &[ViewerSnapshot],
        _chat: &[ChatMetric],
        channel: &Channel,
    ) -> anyhow::Result<SignalResult> {
        if channel.follower_count == 0 {
            return Ok(SignalResult::insufficient("no follower data", 0.1));
        }
        let viewers = positive_viewers(snapshots);
        if viewers.is_empty() {
            return Ok(SignalResult::insufficient("no viewer data", 0.1));
        }

        let avg = mean(&viewers);
        let max = viewers.iter().copied().fold(0.0, f64::max);
        let ratio = avg / channel.follower_count as f64;
        let score = Self::score_for(ratio);
        let confidence = f64::min(1.0, viewers.len() as f64 / 10.0);

        Ok(SignalResult::new(
            round_to(score.clamp(0.0, 100.0), 2),
            round_to(confidence, 2),
            json!({
                "avg_viewers": round_to(avg, 0),
                "max_viewers": max as u64,
                "follower_count": channel.follower_count,
                "viewer_follower_ratio": round_to(ratio, 4),
                "data_points": viewers.len(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelKey, Platform};
    use chrono::Utc;

    fn channel(followers: u64) -> Channel {
        let mut ch = Channel::new(ChannelKey::new(Platform::YouTube, "x"));
        ch.follower_count = followers;
        ch
    }

    fn snaps(v: &[u64]) -> Vec<ViewerSnapshot> {
        v.iter().map(|&v| ViewerSnapshot::new(v, 1, Utc::now())).collect()
    }

    #[test]
    fn missing_inputs() {
        let r = FollowerRatioSignal
            .calculate(&snaps(&[10]), &[], &channel(0))
            .unwrap();
        assert_eq!(r.reason(), Some("no follower data"));
        let r = FollowerRatioSignal
            .calculate(&snaps(&[0, 0]), &[], &channel(100))
            .unwrap();
        assert_eq!(r.reason(), Some("no viewer data"));
        assert_eq!(r.confidence, 0.1);
    }

    #[test]
    fn small_audience_is_normal() {
        let r = FollowerRatioSignal
            .calculate(&snaps(&[100; 10]), &[], &channel(10_000))
            .unwrap();
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.details["viewer_follower_ratio"], 0.01);
    }

    #[test]
    fn more_viewers_than_followers() {
        let r = FollowerRatioSignal
            .calculate(&snaps(&[1500, 2500]), &[], &channel(1000))
            .unwrap();
        // ratio 2.0 → 60 + 40
        assert_eq!(r.score, 100.0);
        assert_eq!(r.details["max_viewers"], 2500);
        assert_eq!(r.details["avg_viewers"], 2000.0);
        assert_eq!(r.confidence, 0.2);
    }

    #[test]
    fn breakpoints_are_continuous() {
        assert!((FollowerRatioSignal::score_for(0.5) - 20.0).abs() < 1e-9);
        assert!((FollowerRatioSignal::score_for(0.5000001) - 20.0).abs() < 1e-3);
        assert!((FollowerRatioSignal::score_for(1.0) - 60.0).abs() < 1e-9);
    }
}
