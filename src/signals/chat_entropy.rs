//! Chat diversity: entropy, uniqueness and timing regularity of chat windows.

use serde_json::json;

use super::stats::{mean, population_stdev};
use super::Signal;
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

/// Typical organic chat carries 4–8 bits of message entropy.
const MAX_EXPECTED_ENTROPY: f64 = 8.0;
const UNIQUE_RATIO_FLOOR: f64 = 0.8;
const TIMING_CV_FLOOR: f64 = 0.3;

const ENTROPY_WEIGHT: f64 = 0.4;
const UNIQUE_WEIGHT: f64 = 0.35;
const TIMING_WEIGHT: f64 = 0.25;

pub struct ChatEntropySignal;

impl Signal for ChatEntropySignal {
    fn name(&self) -> &'static str {
        "chat_entropy"
    }

    fn default_weight(&self) -> f64 {
        0.15
    }

    fn calculate(
        &self,
        _snapshots: &[ViewerSnapshot],
        chat: &[ChatMetric],
        _channel: &Channel,
    ) -> anyhow::Result<SignalResult> {
        if chat.is_empty() {
            return Ok(SignalResult::insufficient("no chat data", 0.0));
        }

        let active: Vec<&ChatMetric> = chat.iter().filter(|m| !m.is_empty()).collect();
        if active.is_empty() {
            return Ok(SignalResult::insufficient("no message data", 0.1));
        }

        let entropies: Vec<f64> = active.iter().map(|m| m.message_entropy).collect();
        let uniques: Vec<f64> = active.iter().map(|m| m.unique_message_ratio).collect();
        let gaps: Vec<f64> = active.iter().map(|m| m.avg_time_between_msgs).collect();

        let avg_entropy = mean(&entropies);
        let avg_unique = mean(&uniques);
        let avg_timing = mean(&gaps);

        let normalized = f64::min(1.0, avg_entropy / MAX_EXPECTED_ENTROPY);
        let entropy_score = (1.0 - normalized) * 100.0;

        let unique_score = if avg_unique < UNIQUE_RATIO_FLOOR {
            (1.0 - avg_unique) * 100.0
        } else {
            0.0
        };

        // Near-constant gaps between messages look scripted.
        let mut timing_score = 0.0;
        if avg_timing > 0.0 && gaps.len() > 1 {
            let cv = population_stdev(&gaps) / avg_timing;
            if cv < TIMING_CV_FLOOR {
                timing_score = (TIMING_CV_FLOOR - cv) / TIMING_CV_FLOOR * 100.0;
            }
        }

        let score = entropy_score * ENTROPY_WEIGHT
            + unique_score * UNIQUE_WEIGHT
            + timing_score * TIMING_WEIGHT;
        let confidence = f64::min(1.0, active.len() as f64 / 5.0);

        Ok(SignalResult::new(
            round_to(score.clamp(0.0, 100.0), 2),
            round_to(confidence, 2),
            json!({
                "avg_entropy": round_to(avg_entropy, 4),
                "normalized_entropy": round_to(normalized, 4),
                "avg_unique_ratio": round_to(avg_unique, 4),
                "avg_timing_gap": round_to(avg_timing, 4),
                "entropy_score": round_to(entropy_score, 2),
                "unique_score": round_to(unique_score, 2),
                "timing_score": round_to(timing_score, 2),
                "data_points": active.len(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelKey, Platform};
    use chrono::Utc;

    fn window(count: u64, entropy: f64, unique: f64, gap: f64) -> ChatMetric {
        let now = Utc::now();
        ChatMetric {
            window_start: now,
            window_end: now,
            message_count: count,
            unique_chatters: count,
            message_entropy: entropy,
            unique_message_ratio: unique,
            avg_time_between_msgs: gap,
        }
    }

    fn run(chat: &[ChatMetric]) -> SignalResult {
        let ch = Channel::new(ChannelKey::new(Platform::Twitch, "x"));
        ChatEntropySignal.calculate(&[], chat, &ch).unwrap()
    }

    #[test]
    fn no_windows_and_empty_windows() {
        let r = run(&[]);
        assert_eq!((r.score, r.confidence), (0.0, 0.0));
        assert_eq!(r.reason(), Some("no chat data"));

        let r = run(&[ChatMetric::empty(Utc::now())]);
        assert_eq!((r.score, r.confidence), (0.0, 0.1));
        assert_eq!(r.reason(), Some("no message data"));
    }

    #[test]
    fn diverse_irregular_chat_is_clean() {
        let r = run(&[
            window(50, 8.0, 0.95, 0.5),
            window(40, 8.0, 0.9, 1.5),
            window(60, 8.0, 0.92, 2.5),
        ]);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 0.6);
        assert_eq!(r.details["timing_score"], 0.0);
    }

    #[test]
    fn repetitive_metronomic_chat_is_suspicious() {
        let chat = vec![window(30, 0.0, 0.0, 2.0); 5];
        let r = run(&chat);
        // 0.4 * 100 + 0.35 * 100 + 0.25 * 100
        assert_eq!(r.score, 100.0);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.details["data_points"], 5);
    }

    #[test]
    fn single_window_skips_timing() {
        let r = run(&[window(10, 4.0, 0.5, 1.0)]);
        // entropy 50 * 0.4 + unique 50 * 0.35
        assert_eq!(r.score, 37.5);
        assert_eq!(r.details["timing_score"], 0.0);
    }
}
