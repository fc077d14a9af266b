use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{Tenant, TenantId};
use crate::error::DomainError;
use crate::repositories::TenantRepository;

#[derive(Debug, Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tenant directly, bypassing the subdomain uniqueness check.
    pub fn insert(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id, tenant);
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, DomainError> {
        Ok(self.tenants.read().get(&id).cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DomainError> {
        let subdomain = subdomain.to_lowercase();
        Ok(self
            .tenants
            .read()
            .values()
            .find(|t| t.subdomain == subdomain && !t.is_deleted())
            .cloned())
    }

    async fn subdomain_exists(&self, subdomain: &str) -> Result<bool, DomainError> {
        let subdomain = subdomain.to_lowercase();
        Ok(self.tenants.read().values().any(|t| t.subdomain == subdomain))
    }

    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let mut tenants = self.tenants.write();
        if tenants.values().any(|t| t.subdomain == tenant.subdomain) {
            return Err(DomainError::SubdomainAlreadyExists(tenant.subdomain.clone()));
        }
        tenants.insert(tenant.id, tenant.clone());
        debug!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "Tenant stored in memory");
        Ok(tenant.clone())
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let mut tenants = self.tenants.write();
        match tenants.get_mut(&tenant.id) {
            Some(existing) => {
                *existing = tenant.clone();
                Ok(tenant.clone())
            }
            None => Err(DomainError::TenantNotFound),
        }
    }

    async fn remove(&self, id: TenantId) -> Result<(), DomainError> {
        self.tenants
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::TenantNotFound)
    }
}
