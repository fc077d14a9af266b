// ============================================================================
// StockHub Core - Access Entities
// File: crates/stockhub-core/src/domain/access.rs
// Description: Tenant users, roles and user-role assignments
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use stockhub_shared::{new_id, AuditFields, EntityId};

use super::entity::{impl_tenant_scoped, EntityKind, LinkRecord};
use super::TenantId;

/// Tenant role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    Owner,
    Admin,
    Member,
    Guest,
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::Owner => "owner",
            TenantRole::Admin => "admin",
            TenantRole::Member => "member",
            TenantRole::Guest => "guest",
        }
    }
}

impl Default for TenantRole {
    fn default() -> Self {
        TenantRole::Member
    }
}

/// A user account belonging to one tenant. Counted against the user quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TenantUser {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    #[validate(length(min = 2, max = 100, message = "Display name must be between 2 and 100 characters"))]
    pub display_name: String,

    pub role_in_tenant: TenantRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl TenantUser {
    pub fn new(email: String, display_name: String, role_in_tenant: TenantRole) -> Result<Self, validator::ValidationErrors> {
        let user = Self {
            id: new_id(),
            tenant_id: None,
            email: email.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            role_in_tenant,
            is_active: true,
            last_login_at: None,
            audit: AuditFields::default(),
        };
        user.validate()?;
        Ok(user)
    }
}

impl_tenant_scoped!(TenantUser, EntityKind::TenantUser);

/// Named permission set inside a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Role {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,

    #[validate(length(min = 2, max = 100, message = "Role name must be between 2 and 100 characters"))]
    pub name: String,

    pub description: Option<String>,
    /// System roles cannot be deleted.
    pub is_system_role: bool,
    pub permissions: Vec<String>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Role {
    pub fn new(name: String, permissions: Vec<String>) -> Result<Self, validator::ValidationErrors> {
        let role = Self {
            id: new_id(),
            tenant_id: None,
            name: name.trim().to_string(),
            description: None,
            is_system_role: false,
            permissions,
            audit: AuditFields::default(),
        };
        role.validate()?;
        Ok(role)
    }
}

impl_tenant_scoped!(Role, EntityKind::Role);

/// User-role assignment (join row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,
    pub user_id: EntityId,
    pub role_id: EntityId,
    pub assigned_at: DateTime<Utc>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl UserRole {
    pub fn new(user_id: EntityId, role_id: EntityId) -> Self {
        Self {
            id: new_id(),
            tenant_id: None,
            user_id,
            role_id,
            assigned_at: Utc::now(),
            audit: AuditFields::default(),
        }
    }
}

impl_tenant_scoped!(UserRole, EntityKind::UserRole);

impl LinkRecord for UserRole {}
