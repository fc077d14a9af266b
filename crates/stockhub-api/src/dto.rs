//! Request and response payloads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use stockhub_core::domain::{ResourceLimits, SubscriptionTier, Tenant, TenantId};
use stockhub_shared::constants::DEFAULT_PAGE_SIZE;
use stockhub_shared::Pagination;

/// Tenant signup payload - POST /api/auth/signup
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 200, message = "Company name must be between 2 and 200 characters"))]
    pub company_name: String,

    #[validate(length(min = 1, max = 63, message = "Subdomain must be between 1 and 63 characters"))]
    pub subdomain: String,

    #[validate(email(message = "Admin email is invalid"))]
    pub admin_email: String,

    #[validate(length(min = 2, max = 100, message = "Admin name must be between 2 and 100 characters"))]
    pub admin_name: String,

    #[serde(default)]
    pub tier: SubscriptionTier,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub tenant: TenantDto,
    pub admin_user_id: Uuid,
    pub access_token: String,
}

/// Tenant as exposed to its own users. The connection target stays internal.
#[derive(Debug, Serialize)]
pub struct TenantDto {
    pub id: TenantId,
    pub name: String,
    pub subdomain: String,
    pub tier: SubscriptionTier,
    pub limits: ResourceLimits,
    pub subscription_expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<Tenant> for TenantDto {
    fn from(tenant: Tenant) -> Self {
        Self {
            limits: tenant.limits(),
            id: tenant.id,
            name: tenant.name,
            subdomain: tenant.subdomain,
            tier: tenant.tier,
            subscription_expires_at: tenant.subscription_expires_at,
            is_active: tenant.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpgradeTierRequest {
    pub tier: SubscriptionTier,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendSubscriptionRequest {
    #[validate(range(min = 1, max = 120, message = "Months must be between 1 and 120"))]
    pub months: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be between 1 and 200 characters"))]
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub reorder_level: Option<i32>,
}

/// `?page=&per_page=` plus an optional free-text search.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.per_page.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogParams {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl AuditLogParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.per_page.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}
