//! Tenant registry trait (port)

use async_trait::async_trait;

use crate::domain::{Tenant, TenantId};
use crate::error::DomainError;

/// Registry of tenants. Not tenant-scoped: it is the root of resolution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, DomainError>;
    /// Case-insensitive lookup. Soft-deleted tenants are never returned.
    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DomainError>;
    async fn subdomain_exists(&self, subdomain: &str) -> Result<bool, DomainError>;
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, DomainError>;
    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError>;
    /// Physical removal, only for a signup that failed before the tenant
    /// was usable. Frees the subdomain again.
    async fn remove(&self, id: TenantId) -> Result<(), DomainError>;
}
