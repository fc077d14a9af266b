// ============================================================================
// StockHub Core - Quota Enforcer
// File: crates/stockhub-core/src/tenancy/quota.rs
// Description: Tier-derived user, product and request-rate limits
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Limit, Product, ResourceKind, Tenant, TenantId, TenantUser, UsageSnapshot};
use crate::error::{DomainError, QuotaRejection};
use crate::repositories::{RateCounter, RateWindowKey, TenantRepository};
use crate::tenancy::gate::IsolationGate;

/// Outcome of a non-mutating quota check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaDecision {
    pub resource: ResourceKind,
    pub allowed: bool,
    pub current: u64,
    pub limit: Limit,
}

/// Rate-limit state after admitting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub struct QuotaEnforcer {
    tenants: Arc<dyn TenantRepository>,
    gate: Arc<IsolationGate>,
    counter: Arc<dyn RateCounter>,
}

impl QuotaEnforcer {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        gate: Arc<IsolationGate>,
        counter: Arc<dyn RateCounter>,
    ) -> Self {
        Self {
            tenants,
            gate,
            counter,
        }
    }

    /// Would one more `resource` be allowed right now? Nothing is counted.
    pub async fn check_quota(&self, tenant_id: TenantId, resource: ResourceKind) -> Result<QuotaDecision, DomainError> {
        self.check_quota_at(tenant_id, resource, Utc::now()).await
    }

    pub async fn check_quota_at(
        &self,
        tenant_id: TenantId,
        resource: ResourceKind,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, DomainError> {
        let tenant = self.load_tenant(tenant_id).await?;
        let limits = tenant.limits();

        let (current, limit) = match resource {
            ResourceKind::User => (
                self.gate.count_for_tenant::<TenantUser>(tenant_id).await?,
                limits.max_users,
            ),
            ResourceKind::Product => (
                self.gate.count_for_tenant::<Product>(tenant_id).await?,
                limits.max_products,
            ),
            ResourceKind::ApiCallPerMinute => (
                self.counter.current(&RateWindowKey::at(tenant_id, now)).await?,
                Limit::Bounded(u64::from(limits.api_calls_per_minute)),
            ),
        };

        let decision = QuotaDecision {
            resource,
            allowed: limit.permits(current),
            current,
            limit,
        };
        debug!(
            tenant_id = %tenant_id,
            resource = resource.as_str(),
            current,
            limit = %limit,
            allowed = decision.allowed,
            "Quota checked"
        );
        Ok(decision)
    }

    /// Fails with [`DomainError::QuotaExceeded`] when creating one more
    /// `resource` would pass the tier limit. The passing decision carries the
    /// limit for the commit-time re-check.
    pub async fn ensure_within_quota(&self, tenant_id: TenantId, resource: ResourceKind) -> Result<QuotaDecision, DomainError> {
        let decision = self.check_quota(tenant_id, resource).await?;
        if decision.allowed {
            return Ok(decision);
        }

        warn!(
            tenant_id = %tenant_id,
            resource = resource.as_str(),
            current = decision.current,
            limit = %decision.limit,
            "Quota exceeded"
        );
        Err(DomainError::QuotaExceeded(QuotaRejection {
            tenant_id,
            resource,
            current: decision.current,
            limit: decision.limit,
            reset_at: None,
            retry_after_secs: None,
        }))
    }

    /// Count one inbound request against the tenant's per-minute window.
    ///
    /// The tenant must exist with an active subscription. Rejected requests
    /// still occupy the window.
    pub async fn admit_request(&self, tenant_id: TenantId) -> Result<RateLimitStatus, DomainError> {
        self.admit_request_at(tenant_id, Utc::now()).await
    }

    pub async fn admit_request_at(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<RateLimitStatus, DomainError> {
        let tenant = self.load_tenant(tenant_id).await?;
        if !tenant.is_subscription_active_at(now) {
            debug!(tenant_id = %tenant_id, "Request from tenant without active subscription");
            return Err(DomainError::TenantNotActive);
        }

        let limit = tenant.limits().api_calls_per_minute;
        let key = RateWindowKey::at(tenant_id, now);
        let count = self.counter.increment(&key).await?;
        let reset_at = key.window_end();

        if count > u64::from(limit) {
            let retry_after_secs = (reset_at - now).num_seconds().max(1) as u64;
            warn!(
                tenant_id = %tenant_id,
                count,
                limit,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(DomainError::QuotaExceeded(QuotaRejection {
                tenant_id,
                resource: ResourceKind::ApiCallPerMinute,
                current: count,
                limit: Limit::Bounded(u64::from(limit)),
                reset_at: Some(reset_at),
                retry_after_secs: Some(retry_after_secs),
            }));
        }

        Ok(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(count as u32),
            reset_at,
        })
    }

    pub async fn usage(&self, tenant_id: TenantId) -> Result<UsageSnapshot, DomainError> {
        self.usage_at(tenant_id, Utc::now()).await
    }

    pub async fn usage_at(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<UsageSnapshot, DomainError> {
        let tenant = self.load_tenant(tenant_id).await?;
        let limits = tenant.limits();
        let key = RateWindowKey::at(tenant_id, now);

        Ok(UsageSnapshot {
            tenant_id,
            tier: tenant.tier,
            user_count: self.gate.count_for_tenant::<TenantUser>(tenant_id).await?,
            max_users: limits.max_users,
            product_count: self.gate.count_for_tenant::<Product>(tenant_id).await?,
            max_products: limits.max_products,
            api_calls_current_window: self.counter.current(&key).await?,
            api_rate_limit: limits.api_calls_per_minute,
            window_resets_at: key.window_end(),
        })
    }

    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Tenant, DomainError> {
        match self.tenants.find_by_id(tenant_id).await? {
            Some(tenant) if !tenant.is_deleted() => Ok(tenant),
            _ => Err(DomainError::TenantNotFound),
        }
    }
}
