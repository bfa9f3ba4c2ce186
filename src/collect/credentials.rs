//! Short-lived access tokens owned by a collector.
//!
//! A [`TokenCache`] is always in one of three states (see [`TokenState`]); the
//! owning collector calls [`TokenCache::valid_token`] before every authenticated
//! request and refreshes when it gets `None`.

use std::time::Duration;
use tokio::time::Instant;

/// Refresh this long before the provider-declared expiry.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Missing,
    Valid,
    /// Past expiry, or inside the refresh margin.
    Expired,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TokenCache {
    token: Option<AccessToken>,
    margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(REFRESH_MARGIN)
    }
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self {
            token: None,
            margin,
        }
    }

    pub fn state(&self, now: Instant) -> TokenState {
        match &self.token {
            None => TokenState::Missing,
            Some(t) if now + self.margin < t.expires_at => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    /// The token value if it is usable at `now`.
    pub fn valid_token(&self, now: Instant) -> Option<&str> {
        match self.state(now) {
            TokenState::Valid => self.token.as_ref().map(|t| t.value.as_str()),
            _ => None,
        }
    }

    /// Record a freshly issued token valid for `expires_in` from `now`.
    pub fn store(&mut self, value: impl Into<String>, expires_in: Duration, now: Instant) {
        self.token = Some(AccessToken {
            value: value.into(),
            expires_at: now + expires_in,
        });
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}
