//! Collector error types.

use thiserror::Error;

use crate::model::Platform;

/// Failures a collector surfaces to its caller.
///
/// "Not found" and "blocked" responses are not here: they degrade to empty records.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Provider quota is spent; skip this platform until it resets, do not retry.
    #[error("{platform} API quota exhausted")]
    QuotaExhausted { platform: Platform },

    /// Non-success HTTP status other than 403/404.
    #[error("{platform} API returned HTTP {status} for {endpoint}")]
    Status {
        platform: Platform,
        status: u16,
        endpoint: String,
    },

    /// Network-level failure (connect, timeout, TLS, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Payload did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Access-token acquisition failed.
    #[error("{platform} authentication failed: {message}")]
    Auth { platform: Platform, message: String },

    /// Live chat transport failure.
    #[error("chat connection error: {0}")]
    Chat(String),
}

impl CollectorError {
    pub fn quota(platform: Platform) -> Self {
        Self::QuotaExhausted { platform }
    }

    pub fn chat(msg: impl Into<String>) -> Self {
        Self::Chat(msg.into())
    }

    /// True for the expected "come back later" condition.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_distinguishable() {
        let e = CollectorError::quota(Platform::YouTube);
        assert!(e.is_quota());
        assert_eq!(e.to_string(), "youtube API quota exhausted");

        let e = CollectorError::Status {
            platform: Platform::Twitch,
            status: 500,
            endpoint: "/streams".into(),
        };
        assert!(!e.is_quota());
        assert!(e.to_string().contains("HTTP 500"));
    }
}
