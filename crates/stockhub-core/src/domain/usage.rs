//! Quota resources and the derived usage snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Limit, SubscriptionTier, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    Product,
    ApiCallPerMinute,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Product => "product",
            ResourceKind::ApiCallPerMinute => "api_call_per_minute",
        }
    }
}

/// Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub tenant_id: TenantId,
    pub tier: SubscriptionTier,
    pub user_count: u64,
    pub max_users: Limit,
    pub product_count: u64,
    pub max_products: Limit,
    pub api_calls_current_window: u64,
    pub api_rate_limit: u32,
    pub window_resets_at: DateTime<Utc>,
}
