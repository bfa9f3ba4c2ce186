// src/config/credentials.rs
use std::env;

pub const TWITCH_CLIENT_ID_ENV: &str = "TWITCH_CLIENT_ID";
pub const TWITCH_CLIENT_SECRET_ENV: &str = "TWITCH_CLIENT_SECRET";
pub const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Platform API credentials. Empty strings mean "not configured"; the
/// matching collector then returns empty records instead of failing.
#[derive(Clone, Default, PartialEq)]
pub struct PlatformCredentials {
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    pub youtube_api_key: String,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("twitch", &self.has_twitch())
            .field("youtube", &self.has_youtube())
            .finish()
    }
}

fn var_trimmed(key: &str) -> String {
    env::var(key).map(|v| v.trim().to_string()).unwrap_or_default()
}

impl PlatformCredentials {
    pub fn from_env() -> Self {
        Self {
            twitch_client_id: var_trimmed(TWITCH_CLIENT_ID_ENV),
            twitch_client_secret: var_trimmed(TWITCH_CLIENT_SECRET_ENV),
            youtube_api_key: var_trimmed(YOUTUBE_API_KEY_ENV),
        }
    }

    pub fn has_twitch(&self) -> bool {
        !self.twitch_client_id.is_empty() && !self.twitch_client_secret.is_empty()
    }

    pub fn has_youtube(&self) -> bool {
        !self.youtube_api_key.is_empty()
    }
}
