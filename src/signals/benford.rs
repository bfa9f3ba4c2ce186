//! Benford's Law on the leading digits of viewer counts.
//!
//! Naturally varying counts follow a logarithmic first-digit distribution.
//! Deviation is measured by MAD (mean absolute deviation over the nine
//! digits) and a chi-squared goodness-of-fit test. The thresholds are fixed
//! and must not be re-tuned, or historical scores stop being comparable.

use std::collections::BTreeMap;

use serde_json::json;

use super::Signal;
use crate::model::{round_to, Channel, ChatMetric, SignalResult, ViewerSnapshot};

/// Expected frequency of first digits 1..=9.
pub const EXPECTED: [f64; 9] = [0.301, 0.176, 0.125, 0.097, 0.079, 0.067, 0.058, 0.051, 0.046];
/// Chi-squared critical value, df = 8, p = 0.05.
pub const CHI_SQ_CRITICAL: f64 = 15.507;
pub const MIN_SAMPLES: usize = 20;

pub struct BenfordSignal;

pub fn first_digit(mut n: u64) -> Option<usize> {
    if n == 0 {
        return None;
    }
    while n >= 10 {
        n /= 10;
    }
    Some(n as usize)
}

impl BenfordSignal {
    pub fn score_for(mad: f64, chi_squared: f64) -> f64 {
        let base = if mad <= 0.006 {
            0.0
        } else if mad <= 0.012 {
            (mad - 0.006) / 0.006 * 30.0
        } else if mad <= 0.015 {
            30.0 + (mad - 0.012) / 0.003 * 20.0
        } else {
            50.0 + f64::min(50.0, (mad - 0.015) / 0.015 * 50.0)
        };
        if chi_squared > CHI_SQ_CRITICAL {
            f64::min(100.0, base + 10.0)
        } else {
            base
        }
    }
}

impl Signal for BenfordSignal {
    fn name(&self) -> &'static str {
        "benford"
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
        let digits: Vec<usize> = snapshots
            .iter()
            .filter_map(|s| first_digit(s.viewer_count))
            .collect();
        if digits.len() < MIN_SAMPLES {
            return Ok(SignalResult::insufficient("need at least 20 data points", 0.1));
        }

        let n = digits.len() as f64;
        let mut observed = [0usize; 9];
        for d in &digits {
            observed[d - 1] += 1;
        }

        let mut chi_squared = 0.0;
        let mut mad = 0.0;
        let mut distribution = BTreeMap::new();
        for (i, &count) in observed.iter().enumerate() {
            let expected = EXPECTED[i] * n;
            chi_squared += (count as f64 - expected).powi(2) / expected;
            let freq = count as f64 / n;
            mad += (freq - EXPECTED[i]).abs();
            distribution.insert((i + 1).to_string(), round_to(freq, 4));
        }
        mad /= 9.0;

        let score = Self::score_for(mad, chi_squared);
        let confidence = f64::min(1.0, n / 50.0);

        Ok(SignalResult::new(
            round_to(score.clamp(0.0, 100.0), 2),
            round_to(confidence, 2),
            json!({
                "chi_squared": round_to(chi_squared, 4),
                "mad": round_to(mad, 6),
                "sample_size": digits.len(),
                "observed_distribution": distribution,
                "chi_sq_critical_p05": CHI_SQ_CRITICAL,
            }),
        ))
    }
}
