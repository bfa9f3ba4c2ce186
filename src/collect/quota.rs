//! Daily unit quota for APIs that bill per call (YouTube Data API).
//!
//! Units are charged *before* a request is sent; a charge that would overrun
//! the limit fails with [`CollectorError::QuotaExhausted`] and is not recorded.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::collect::error::CollectorError;
use crate::model::Platform;

pub const QUOTA_WINDOW: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug)]
pub struct DailyQuota {
    platform: Platform,
    limit: u32,
    window: Duration,
    inner: Mutex<QuotaState>,
}

#[derive(Debug)]
struct QuotaState {
    used: u32,
    resets_at: Instant,
}

impl DailyQuota {
    pub fn new(platform: Platform, limit: u32) -> Self {
        Self::with_window(platform, limit, QUOTA_WINDOW)
    }

    pub fn with_window(platform: Platform, limit: u32, window: Duration) -> Self {
        Self {
            platform,
            limit,
            window,
            inner: Mutex::new(QuotaState {
                used: 0,
                resets_at: Instant::now() + window,
            }),
        }
    }

    /// Reserve `cost` units or fail without side effects.
    pub fn charge(&self, cost: u32) -> Result<(), CollectorError> {
        let now = Instant::now();
        let mut st = self.inner.lock().expect("quota mutex poisoned");
        if now > st.resets_at {
            st.used = 0;
            st.resets_at = now + self.window;
        }
        if st.used.saturating_add(cost) > self.limit {
            return Err(CollectorError::quota(self.platform));
        }
        st.used += cost;
        Ok(())
    }

    pub fn used(&self) -> u32 {
        self.inner.lock().expect("quota mutex poisoned").used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn charges_until_limit_then_resets() {
        let q = DailyQuota::with_window(Platform::YouTube, 250, Duration::from_secs(60));
        q.charge(100).unwrap();
        q.charge(100).unwrap();
        let err = q.charge(100).unwrap_err();
        assert!(err.is_quota());
        assert_eq!(q.used(), 200, "failed charge must not be recorded");
        q.charge(50).unwrap();
        assert_eq!(q.used(), 250);

        tokio::time::advance(Duration::from_secs(61)).await;
        q.charge(100).unwrap();
        assert_eq!(q.used(), 100);
    }
}
