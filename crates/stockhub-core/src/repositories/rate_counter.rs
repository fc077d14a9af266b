//! Fixed-window request counter trait (port)

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use stockhub_shared::constants::RATE_WINDOW_SECONDS;

use crate::domain::TenantId;
use crate::error::DomainError;

/// One tenant's one-minute bucket, keyed like `rate_limit:{tenant}:{yyyyMMddHHmm}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateWindowKey {
    pub tenant_id: TenantId,
    pub window_start: DateTime<Utc>,
}

impl RateWindowKey {
    pub fn at(tenant_id: TenantId, now: DateTime<Utc>) -> Self {
        let window_start = now
            .duration_trunc(TimeDelta::seconds(RATE_WINDOW_SECONDS))
            .unwrap_or(now);
        Self {
            tenant_id,
            window_start,
        }
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_start + TimeDelta::seconds(RATE_WINDOW_SECONDS)
    }

    pub fn cache_key(&self) -> String {
        format!(
            "rate_limit:{}:{}",
            self.tenant_id,
            self.window_start.format("%Y%m%d%H%M")
        )
    }
}

#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Atomically add one and return the new count.
    async fn increment(&self, key: &RateWindowKey) -> Result<u64, DomainError>;
    async fn current(&self, key: &RateWindowKey) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_key_truncates_to_minute() {
        let tenant = TenantId::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 7, 42).unwrap();
        let key = RateWindowKey::at(tenant, now);

        assert_eq!(key.window_start, Utc.with_ymd_and_hms(2024, 3, 9, 14, 7, 0).unwrap());
        assert_eq!(key.window_end(), Utc.with_ymd_and_hms(2024, 3, 9, 14, 8, 0).unwrap());
        assert_eq!(key.cache_key(), format!("rate_limit:{}:202403091407", tenant));
    }
}
