use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use tracing::debug;

use crate::error::DomainError;
use crate::repositories::{RateCounter, RateWindowKey};

/// Fixed-window counter held in a [`DashMap`].
///
/// Opening a new window evicts windows that started more than one window
/// before it. The previous minute survives, so a request that read the clock
/// just before a boundary still lands in its own window after another tenant
/// has opened the next one.
#[derive(Debug, Default)]
pub struct InMemoryRateCounter {
    windows: DashMap<RateWindowKey, u64>,
}

impl InMemoryRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn evict_before(&self, key: &RateWindowKey) {
        let cutoff = key.window_start - Duration::minutes(1);
        let before = self.windows.len();
        self.windows
            .retain(|existing, _| existing.window_start >= cutoff);
        let evicted = before.saturating_sub(self.windows.len());
        if evicted > 0 {
            debug!(evicted, "Evicted expired rate-limit windows");
        }
    }
}

#[async_trait]
impl RateCounter for InMemoryRateCounter {
    async fn increment(&self, key: &RateWindowKey) -> Result<u64, DomainError> {
        if !self.windows.contains_key(key) {
            self.evict_before(key);
        }
        let mut count = self.windows.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn current(&self, key: &RateWindowKey) -> Result<u64, DomainError> {
        Ok(self.windows.get(key).map(|count| *count).unwrap_or(0))
    }
}
