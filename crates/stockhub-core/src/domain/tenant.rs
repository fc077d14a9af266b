// ============================================================================
// StockHub Core - Tenant Entity
// File: crates/stockhub-core/src/domain/tenant.rs
// Description: Tenant registry record with subscription management
// ============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use stockhub_shared::utils::parse_identity;

use crate::error::DomainError;

/// Opaque tenant identity. Never nil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    pub fn new() -> Self {
        TenantId(Uuid::new_v4())
    }

    /// `None` for the nil UUID, which stands for "unset".
    pub fn from_uuid(id: Uuid) -> Option<Self> {
        (!id.is_nil()).then_some(TenantId(id))
    }

    /// Lenient parse for identities from claims and headers: malformed
    /// input is absent, not an error.
    pub fn parse(s: &str) -> Option<Self> {
        parse_identity(s).map(TenantId)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<TenantId> for Uuid {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Subscription tier. Ordered: Free < Starter < Professional < Enterprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Starter,
    Professional,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Professional => "professional",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    pub fn limits(&self) -> ResourceLimits {
        match self {
            SubscriptionTier::Free => ResourceLimits {
                max_users: Limit::Bounded(1),
                max_products: Limit::Bounded(10),
                api_calls_per_minute: 60,
            },
            SubscriptionTier::Starter => ResourceLimits {
                max_users: Limit::Bounded(5),
                max_products: Limit::Bounded(100),
                api_calls_per_minute: 300,
            },
            SubscriptionTier::Professional => ResourceLimits {
                max_users: Limit::Bounded(25),
                max_products: Limit::Bounded(1000),
                api_calls_per_minute: 1000,
            },
            SubscriptionTier::Enterprise => ResourceLimits {
                max_users: Limit::Unlimited,
                max_products: Limit::Unlimited,
                api_calls_per_minute: 5000,
            },
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "starter" => Ok(SubscriptionTier::Starter),
            "professional" => Ok(SubscriptionTier::Professional),
            "enterprise" => Ok(SubscriptionTier::Enterprise),
            other => Err(DomainError::ValidationError(format!(
                "unknown subscription tier: {}",
                other
            ))),
        }
    }
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        SubscriptionTier::Free
    }
}

/// A count ceiling. `Unlimited` is a sentinel, not a large number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum Limit {
    Bounded(u64),
    Unlimited,
}

impl Limit {
    /// Whether one more resource may be created when `current` exist.
    pub fn permits(&self, current: u64) -> bool {
        match self {
            Limit::Bounded(max) => current < *max,
            Limit::Unlimited => true,
        }
    }

    pub fn as_option(&self) -> Option<u64> {
        match self {
            Limit::Bounded(max) => Some(*max),
            Limit::Unlimited => None,
        }
    }
}

impl From<Option<u64>> for Limit {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Limit::Unlimited, Limit::Bounded)
    }
}

impl From<Limit> for Option<u64> {
    fn from(limit: Limit) -> Self {
        limit.as_option()
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Bounded(max) => write!(f, "{}", max),
            Limit::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Resource ceilings derived from the subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_users: Limit,
    pub max_products: Limit,
    pub api_calls_per_minute: u32,
}

/// Tenant registry record
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Tenant {
    pub id: TenantId,

    #[validate(length(min = 2, max = 200, message = "Tenant name must be between 2 and 200 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 63, message = "Subdomain must be between 1 and 63 characters"))]
    pub subdomain: String,

    /// Where this tenant's data lives.
    pub connection_target: String,

    #[validate(email(message = "Company email is invalid"))]
    pub company_email: Option<String>,

    pub tier: SubscriptionTier,
    pub subscription_expires_at: DateTime<Utc>,
    pub is_active: bool,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<String>,
}

impl Tenant {
    pub fn new(
        name: String,
        subdomain: String,
        company_email: Option<String>,
        tier: SubscriptionTier,
        subscription_expires_at: DateTime<Utc>,
        connection_template: &str,
    ) -> Result<Self, validator::ValidationErrors> {
        let id = TenantId::new();
        let tenant = Self {
            id,
            name: name.trim().to_string(),
            subdomain: subdomain.trim().to_lowercase(),
            connection_target: connection_template.replace("{tenant_id}", &id.to_string()),
            company_email: company_email.map(|e| e.trim().to_string()),
            tier,
            subscription_expires_at,
            is_active: true,
            created_at: Utc::now(),
            created_by: None,
            modified_at: None,
            modified_by: None,
            removed_at: None,
            removed_by: None,
        };

        tenant.validate()?;
        Ok(tenant)
    }

    /// Limits are always derived from the current tier.
    pub fn limits(&self) -> ResourceLimits {
        self.tier.limits()
    }

    pub fn is_subscription_active(&self) -> bool {
        self.is_subscription_active_at(Utc::now())
    }

    pub fn is_subscription_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.subscription_expires_at > now
    }

    /// Move to a strictly higher tier. Same-or-lower is rejected.
    pub fn upgrade_tier(&mut self, tier: SubscriptionTier, modified_by: &str) -> Result<(), DomainError> {
        if tier <= self.tier {
            return Err(DomainError::TierChangeRejected {
                current: self.tier,
                requested: tier,
            });
        }
        self.tier = tier;
        self.touch(modified_by);
        Ok(())
    }

    /// Extend from the later of the current expiry and `now`.
    pub fn extend_subscription(
        &mut self,
        months: u32,
        now: DateTime<Utc>,
        modified_by: &str,
    ) -> Result<(), DomainError> {
        if months == 0 {
            return Err(DomainError::ValidationError(
                "Extension must be at least one month".to_string(),
            ));
        }
        let base = self.subscription_expires_at.max(now);
        self.subscription_expires_at = base
            .checked_add_months(Months::new(months))
            .ok_or_else(|| DomainError::ValidationError("Extension out of range".to_string()))?;
        self.touch(modified_by);
        Ok(())
    }

    pub fn soft_delete(&mut self, deleted_by: &str) {
        self.removed_at = Some(Utc::now());
        self.removed_by = Some(deleted_by.to_string());
        self.is_active = false;
    }

    pub fn is_deleted(&self) -> bool {
        self.removed_at.is_some()
    }

    fn touch(&mut self, modified_by: &str) {
        self.modified_at = Some(Utc::now());
        self.modified_by = Some(modified_by.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tenant(tier: SubscriptionTier) -> Tenant {
        Tenant::new(
            "Acme Supplies".to_string(),
            "Acme".to_string(),
            Some("ops@acme.io".to_string()),
            tier,
            Utc::now() + Duration::days(30),
            "postgres://db/stockhub_{tenant_id}",
        )
        .unwrap()
    }

    #[test]
    fn test_create_tenant() {
        let t = tenant(SubscriptionTier::Starter);
        assert_eq!(t.subdomain, "acme");
        assert!(t.connection_target.ends_with(&t.id.to_string()));
        assert!(t.is_subscription_active());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let result = Tenant::new(
            "Acme".to_string(),
            "acme".to_string(),
            Some("not-an-email".to_string()),
            SubscriptionTier::Free,
            Utc::now(),
            "x",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_subscription_requires_active_and_future_expiry() {
        let mut t = tenant(SubscriptionTier::Free);
        let now = Utc::now();
        assert!(t.is_subscription_active_at(now));
        assert!(!t.is_subscription_active_at(t.subscription_expires_at));

        t.soft_delete("System");
        assert!(t.is_deleted());
        assert!(!t.is_subscription_active_at(now));
    }

    #[test]
    fn test_tier_ordering_and_limits() {
        assert!(SubscriptionTier::Free < SubscriptionTier::Starter);
        assert!(SubscriptionTier::Professional < SubscriptionTier::Enterprise);
        assert_eq!(SubscriptionTier::Free.limits().max_products, Limit::Bounded(10));
        assert_eq!(SubscriptionTier::Enterprise.limits().max_users, Limit::Unlimited);
        assert!(Limit::Unlimited.permits(u64::MAX));
        assert!(!Limit::Bounded(5).permits(5));
    }

    #[test]
    fn test_upgrade_only() {
        let mut t = tenant(SubscriptionTier::Starter);
        assert!(t.upgrade_tier(SubscriptionTier::Starter, "u1").is_err());
        assert!(t.upgrade_tier(SubscriptionTier::Free, "u1").is_err());

        t.upgrade_tier(SubscriptionTier::Professional, "u1").unwrap();
        assert_eq!(t.limits().max_products, Limit::Bounded(1000));
        assert_eq!(t.modified_by.as_deref(), Some("u1"));
    }

    #[test]
    fn test_extend_from_now_when_expired() {
        let mut t = tenant(SubscriptionTier::Free);
        let now = Utc::now();
        t.subscription_expires_at = now - Duration::days(10);
        t.extend_subscription(1, now, "System").unwrap();
        assert!(t.subscription_expires_at > now + Duration::days(27));
    }

    #[test]
    fn test_limit_serializes_as_nullable_number() {
        assert_eq!(serde_json::to_value(Limit::Bounded(3)).unwrap(), serde_json::json!(3));
        assert_eq!(serde_json::to_value(Limit::Unlimited).unwrap(), serde_json::Value::Null);
    }
}
