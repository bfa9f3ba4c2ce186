// tests/engine_aggregation.rs
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use stream_oracle::signals::{default_signals, Signal};
use stream_oracle::weights::SignalWeights;
use stream_oracle::{
    AnalysisEngine, Channel, ChannelKey, ChatMetric, Platform, SignalResult, ViewerSnapshot,
};

/// Stand-in with a fixed outcome, named after a real signal.
struct Canned {
    name: &'static str,
    weight: f64,
    score: f64,
}

impl Signal for Canned {
    fn name(&self) -> &'static str {
        self.name
    }
    fn default_weight(&self) -> f64 {
        self.weight
    }
    fn calculate(
        &self,
        _: &[ViewerSnapshot],
        _: &[ChatMetric],
        _: &Channel,
    ) -> anyhow::Result<SignalResult> {
        Ok(SignalResult::new(self.score, 1.0, json!({ "canned": true })))
    }
}

struct Panicky;

impl Signal for Panicky {
    fn name(&self) -> &'static str {
        "step_function"
    }
    fn default_weight(&self) -> f64 {
        0.20
    }
    fn calculate(
        &self,
        _: &[ViewerSnapshot],
        _: &[ChatMetric],
        _: &Channel,
    ) -> anyhow::Result<SignalResult> {
        panic!("index out of bounds")
    }
}

fn canned_set(scores: [f64; 7]) -> Vec<Arc<dyn Signal>> {
    default_signals()
        .iter()
        .zip(scores)
        .map(|(s, score)| {
            Arc::new(Canned {
                name: s.name(),
                weight: s.default_weight(),
                score,
            }) as Arc<dyn Signal>
        })
        .collect()
}

fn channel() -> Channel {
    let mut ch = Channel::new(ChannelKey::new(Platform::Twitch, "streamer"));
    ch.follower_count = 50_000;
    ch
}

fn organic_history() -> (Vec<ViewerSnapshot>, Vec<ChatMetric>) {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let snaps = (0..40u64)
        .map(|i| {
            let v = 1000 + (i % 8) * 150 + i * 20;
            ViewerSnapshot::new(v, v / 8, start + Duration::minutes(20 * i as i64))
        })
        .collect();
    let chat = (0..6i64)
        .map(|i| {
            let at = start + Duration::hours(i);
            ChatMetric {
                window_start: at,
                window_end: at + Duration::seconds(30),
                message_count: 80 + i as u64,
                unique_chatters: 60,
                message_entropy: 6.1,
                unique_message_ratio: 0.9,
                avg_time_between_msgs: 0.3 + 0.2 * i as f64,
            }
        })
        .collect();
    (snaps, chat)
}

#[test]
fn single_hot_signal_hand_computed() {
    let engine =
        AnalysisEngine::default().with_signals(canned_set([80.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
    let r = engine.analyze(&channel(), &[], &[]);
    // 80 * 0.25 / (0.25 + 0.20 + 0.15 + 0.10 * 4) = 20 / 1.0
    assert_eq!(r.overall_score, 20.0);
    assert_eq!(r.confidence, 1.0);
    assert_eq!(r.label(), "Normal");
    assert_eq!(r.signal_scores.len(), 7);
    assert_eq!(r.signal_scores[0].name, "cvr");
    assert_eq!(r.signal_scores[0].weight, 0.25);
}

#[test]
fn configured_weights_change_the_mix() {
    let weights = SignalWeights::new().with("cvr", 1.0).with("benford", 0.0);
    let engine = AnalysisEngine::new(weights)
        .with_signals(canned_set([80.0, 0.0, 0.0, 0.0, 0.0, 100.0, 0.0]));
    let r = engine.analyze(&channel(), &[], &[]);
    // 80 * 1.0 / (1.0 + 0.20 + 0.15 + 0.10 * 3); benford muted.
    assert_eq!(r.overall_score, 48.48);
    assert_eq!(r.signal("benford").unwrap().weight, 0.0);
}

#[test]
fn panicking_signal_is_isolated() {
    let (snaps, chat) = organic_history();
    let mut signals = default_signals();
    signals[1] = Arc::new(Panicky);
    let engine = AnalysisEngine::default().with_signals(signals);
    let with_panic = engine.analyze(&channel(), &snaps, &chat);

    let failed = with_panic.signal("step_function").unwrap();
    assert_eq!((failed.score, failed.confidence, failed.weight), (0.0, 0.0, 0.20));
    assert_eq!(
        with_panic.signal_details["step_function"]["error"],
        "index out of bounds"
    );

    // The other six match a clean run exactly.
    let clean = AnalysisEngine::default().analyze(&channel(), &snaps, &chat);
    for name in ["cvr", "chat_entropy", "follower_ratio", "growth", "benford", "temporal"] {
        assert_eq!(with_panic.signal(name), clean.signal(name), "{name}");
        assert_eq!(
            with_panic.signal_details[name], clean.signal_details[name],
            "{name}"
        );
    }
    assert!(with_panic.confidence <= clean.confidence);
    assert_eq!(with_panic.data_points, 46);
}

#[test]
fn no_opinion_means_zero() {
    let r = AnalysisEngine::default().analyze(&channel(), &[], &[]);
    assert_eq!(r.overall_score, 0.0);
    // follower_ratio/step/growth/benford/temporal return 0.1 on empty input.
    assert!(r.confidence < 0.1);
    assert_eq!(r.data_points, 0);
    assert_eq!(r.signal_details["cvr"]["reason"], "no data");
}
