// src/collect/providers/mod.rs
pub mod kick;
pub mod twitch;
pub mod youtube;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collect::types::Collector;
use crate::config::PlatformCredentials;
use crate::model::Platform;

pub use kick::KickCollector;
pub use twitch::{TwitchCollector, TwitchCredentials};
pub use youtube::YouTubeCollector;

/// Platform → collector lookup used by the collection cycles.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: BTreeMap<Platform, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One collector per supported platform, configured from `creds`.
    pub fn from_credentials(creds: &PlatformCredentials) -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(TwitchCollector::new(TwitchCredentials::new(
            creds.twitch_client_id.clone(),
            creds.twitch_client_secret.clone(),
        ))));
        reg.register(Arc::new(KickCollector::new()));
        reg.register(Arc::new(YouTubeCollector::new(creds.youtube_api_key.clone())));
        reg
    }

    /// Register (or replace) the collector for its platform.
    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.insert(collector.platform(), collector);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn Collector>> {
        self.collectors.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.collectors.keys().copied().collect()
    }
}
