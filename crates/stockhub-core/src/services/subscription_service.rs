// ============================================================================
// StockHub Core - Subscription Service
// File: crates/stockhub-core/src/services/subscription_service.rs
// ============================================================================
//! Tenant signup and subscription lifecycle

use std::sync::Arc;

use chrono::{Months, Utc};
use tracing::{error, info, warn};

use stockhub_shared::config::TenancySettings;
use stockhub_shared::utils::is_valid_subdomain;

use crate::domain::{ResourceKind, SubscriptionTier, Tenant, TenantId, TenantUser, UsageSnapshot};
use crate::error::DomainError;
use crate::repositories::TenantRepository;
use crate::tenancy::{Actor, IsolationGate, QuotaEnforcer, RequestContext};

/// Signup request
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub subdomain: String,
    pub admin_email: String,
    pub tier: SubscriptionTier,
}

pub struct SubscriptionService {
    tenants: Arc<dyn TenantRepository>,
    gate: Arc<IsolationGate>,
    quota: Arc<QuotaEnforcer>,
    settings: TenancySettings,
}

impl SubscriptionService {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        gate: Arc<IsolationGate>,
        quota: Arc<QuotaEnforcer>,
        settings: TenancySettings,
    ) -> Self {
        Self {
            tenants,
            gate,
            quota,
            settings,
        }
    }

    /// Register a tenant together with its first owner.
    ///
    /// The owner is validated by construction before anything is stored. If
    /// storing the owner fails, the tenant is removed again so the subdomain
    /// stays available.
    pub async fn signup(&self, request: NewTenant, owner: TenantUser) -> Result<(Tenant, TenantUser), DomainError> {
        let tenant = self.create_tenant(request).await?;
        let ctx = RequestContext::for_tenant(tenant.id, Actor::System);

        match self.add_owner(&ctx, &tenant, owner).await {
            Ok(owner) => Ok((tenant, owner)),
            Err(e) => {
                warn!(tenant_id = %tenant.id, error = %e, "Owner not stored, rolling back signup");
                if let Err(cleanup) = self.tenants.remove(tenant.id).await {
                    error!(tenant_id = %tenant.id, error = %cleanup, "Signup rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn add_owner(&self, ctx: &RequestContext, tenant: &Tenant, owner: TenantUser) -> Result<TenantUser, DomainError> {
        let mut uow = self.gate.unit_of_work(ctx)?;
        let owner = uow.add(owner)?;
        uow.limit_rows::<TenantUser>(ResourceKind::User, tenant.limits().max_users);
        uow.require_unique::<TenantUser>("email", &owner.email)?;
        uow.save().await?;
        info!(tenant_id = %tenant.id, user_id = %owner.id, "Tenant owner added");
        Ok(owner)
    }

    /// Register a tenant on the requested tier.
    pub async fn create_tenant(&self, request: NewTenant) -> Result<Tenant, DomainError> {
        let subdomain = request.subdomain.trim().to_lowercase();
        info!("Tenant signup for subdomain: {}", subdomain);

        // 1. Subdomain must be a DNS label
        if !is_valid_subdomain(&subdomain) {
            return Err(DomainError::ValidationError(format!(
                "Invalid subdomain: {}",
                subdomain
            )));
        }

        // 2. Subdomains are never reused, not even after deactivation
        if self.tenants.subdomain_exists(&subdomain).await? {
            warn!("Signup rejected: subdomain taken: {}", subdomain);
            return Err(DomainError::SubdomainAlreadyExists(subdomain));
        }

        // 3. Build tenant with initial subscription window
        let expires_at = Utc::now()
            .checked_add_months(Months::new(self.settings.default_subscription_months))
            .ok_or_else(|| DomainError::InternalError("subscription expiry out of range".to_string()))?;
        let mut tenant = Tenant::new(
            request.name,
            subdomain,
            Some(request.admin_email),
            request.tier,
            expires_at,
            &self.settings.connection_template,
        )?;
        tenant.created_by = Some(Actor::System.to_string());

        // 4. Persist
        let tenant = self.tenants.create(&tenant).await?;
        info!(tenant_id = %tenant.id, tier = tenant.tier.as_str(), "Tenant created");
        Ok(tenant)
    }

    pub async fn get_tenant(&self, tenant_id: TenantId) -> Result<Tenant, DomainError> {
        match self.tenants.find_by_id(tenant_id).await? {
            Some(tenant) if !tenant.is_deleted() => Ok(tenant),
            _ => Err(DomainError::TenantNotFound),
        }
    }

    /// Move to a strictly higher tier. Limits follow immediately.
    pub async fn upgrade_tier(
        &self,
        tenant_id: TenantId,
        tier: SubscriptionTier,
        actor: &Actor,
    ) -> Result<Tenant, DomainError> {
        let mut tenant = self.get_tenant(tenant_id).await?;
        let previous = tenant.tier;
        tenant.upgrade_tier(tier, &actor.to_string())?;

        let tenant = self.tenants.update(&tenant).await?;
        info!(
            tenant_id = %tenant_id,
            from = previous.as_str(),
            to = tenant.tier.as_str(),
            "Subscription tier upgraded"
        );
        Ok(tenant)
    }

    pub async fn extend_subscription(
        &self,
        tenant_id: TenantId,
        months: u32,
        actor: &Actor,
    ) -> Result<Tenant, DomainError> {
        let mut tenant = self.get_tenant(tenant_id).await?;
        tenant.extend_subscription(months, Utc::now(), &actor.to_string())?;

        let tenant = self.tenants.update(&tenant).await?;
        info!(
            tenant_id = %tenant_id,
            months,
            expires_at = %tenant.subscription_expires_at,
            "Subscription extended"
        );
        Ok(tenant)
    }

    /// Soft-delete. The tenant stops resolving but its rows are kept.
    pub async fn deactivate(&self, tenant_id: TenantId, actor: &Actor) -> Result<(), DomainError> {
        let mut tenant = self.get_tenant(tenant_id).await?;
        tenant.soft_delete(&actor.to_string());
        self.tenants.update(&tenant).await?;
        warn!(tenant_id = %tenant_id, "Tenant deactivated");
        Ok(())
    }

    pub async fn usage(&self, tenant_id: TenantId) -> Result<UsageSnapshot, DomainError> {
        self.quota.usage(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Limit, TenantRole};
    use crate::repositories::entity_store::MockEntityStore;
    use crate::repositories::{EntityStore, InMemoryEntityStore, InMemoryRateCounter, InMemoryTenantRepository};
    use crate::tenancy::Query;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> SubscriptionService {
        service_with_store(Arc::new(InMemoryEntityStore::new()))
    }

    fn service_with_store(store: Arc<dyn EntityStore>) -> SubscriptionService {
        let tenants: Arc<dyn TenantRepository> = Arc::new(InMemoryTenantRepository::new());
        let gate = Arc::new(IsolationGate::new(store));
        let quota = Arc::new(QuotaEnforcer::new(
            tenants.clone(),
            gate.clone(),
            Arc::new(InMemoryRateCounter::new()),
        ));
        SubscriptionService::new(
            tenants,
            gate,
            quota,
            TenancySettings {
                connection_template: "postgres://db/stockhub_{tenant_id}".to_string(),
                default_subscription_months: 1,
            },
        )
    }

    fn owner() -> TenantUser {
        TenantUser::new("owner@acme.io".to_string(), "Olive".to_string(), TenantRole::Owner).unwrap()
    }

    fn signup(subdomain: &str, tier: SubscriptionTier) -> NewTenant {
        NewTenant {
            name: "Acme Supplies".to_string(),
            subdomain: subdomain.to_string(),
            admin_email: "owner@acme.io".to_string(),
            tier,
        }
    }

    #[tokio::test]
    async fn test_create_tenant_normalizes_and_stamps_connection() {
        let service = service();
        let tenant = service
            .create_tenant(signup(" Acme ", SubscriptionTier::Free))
            .await
            .unwrap();

        assert_eq!(tenant.subdomain, "acme");
        assert_eq!(
            tenant.connection_target,
            format!("postgres://db/stockhub_{}", tenant.id)
        );
        assert!(tenant.is_subscription_active());
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_subdomains_rejected() {
        let service = service();
        service.create_tenant(signup("acme", SubscriptionTier::Free)).await.unwrap();

        assert!(matches!(
            service.create_tenant(signup("ACME", SubscriptionTier::Starter)).await,
            Err(DomainError::SubdomainAlreadyExists(_))
        ));
        assert!(matches!(
            service.create_tenant(signup("-bad-", SubscriptionTier::Free)).await,
            Err(DomainError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_upgrade_raises_limits_and_rejects_downgrade() {
        let service = service();
        let tenant = service
            .create_tenant(signup("acme", SubscriptionTier::Starter))
            .await
            .unwrap();

        let upgraded = service
            .upgrade_tier(tenant.id, SubscriptionTier::Professional, &Actor::System)
            .await
            .unwrap();
        assert_eq!(upgraded.limits().max_products, Limit::Bounded(1000));

        let usage = service.usage(tenant.id).await.unwrap();
        assert_eq!(usage.max_users, Limit::Bounded(25));

        for tier in [SubscriptionTier::Professional, SubscriptionTier::Starter] {
            assert!(matches!(
                service.upgrade_tier(tenant.id, tier, &Actor::System).await,
                Err(DomainError::TierChangeRejected { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_deactivated_tenant_is_gone_but_subdomain_stays_taken() {
        let service = service();
        let tenant = service
            .create_tenant(signup("acme", SubscriptionTier::Free))
            .await
            .unwrap();

        service.deactivate(tenant.id, &Actor::System).await.unwrap();

        assert!(matches!(
            service.get_tenant(tenant.id).await,
            Err(DomainError::TenantNotFound)
        ));
        assert!(matches!(
            service.create_tenant(signup("acme", SubscriptionTier::Free)).await,
            Err(DomainError::SubdomainAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_extend_subscription() {
        let service = service();
        let tenant = service
            .create_tenant(signup("acme", SubscriptionTier::Free))
            .await
            .unwrap();

        let extended = service
            .extend_subscription(tenant.id, 2, &Actor::User("admin".to_string()))
            .await
            .unwrap();

        assert!(extended.subscription_expires_at > tenant.subscription_expires_at);
        assert_eq!(extended.modified_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_signup_stores_tenant_and_owner() {
        let service = service();
        let (tenant, owner) = service
            .signup(signup("acme", SubscriptionTier::Free), owner())
            .await
            .unwrap();

        assert_eq!(owner.tenant_id, Some(tenant.id));
        let ctx = RequestContext::for_tenant(tenant.id, Actor::System);
        let stored = service.gate.find(&ctx, Query::<TenantUser>::new()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].audit.created_by.as_deref(), Some("System"));
        assert_eq!(service.usage(tenant.id).await.unwrap().user_count, 1);
    }

    #[tokio::test]
    async fn test_failed_owner_write_releases_the_subdomain() {
        let commits = Arc::new(AtomicUsize::new(0));
        let seen = commits.clone();
        let mut store = MockEntityStore::new();
        store.expect_commit().times(2).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DomainError::DatabaseError("connection reset".to_string()))
            } else {
                Ok(())
            }
        });
        let service = service_with_store(Arc::new(store));

        assert!(matches!(
            service.signup(signup("orphan", SubscriptionTier::Free), owner()).await,
            Err(DomainError::DatabaseError(_))
        ));
        assert!(!service.tenants.subdomain_exists("orphan").await.unwrap());

        let (tenant, _) = service
            .signup(signup("orphan", SubscriptionTier::Free), owner())
            .await
            .unwrap();
        assert_eq!(tenant.subdomain, "orphan");
    }
}
