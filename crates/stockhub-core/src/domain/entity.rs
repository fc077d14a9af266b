// ============================================================================
// StockHub Core - Tenant-Scoped Entity Capability
// File: crates/stockhub-core/src/domain/entity.rs
// ============================================================================
//! Compile-time tenant capability shared by every business entity.
//!
//! The isolation gate stamps and checks the owning tenant through
//! [`TenantScoped`] instead of looking fields up by name at runtime.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stockhub_shared::{AuditFields, EntityId};

use crate::domain::TenantId;

/// Every tenant-scoped entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Category,
    Supplier,
    Customer,
    Order,
    StockMovement,
    TenantUser,
    Role,
    UserRole,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Category => "category",
            EntityKind::Supplier => "supplier",
            EntityKind::Customer => "customer",
            EntityKind::Order => "order",
            EntityKind::StockMovement => "stock_movement",
            EntityKind::TenantUser => "tenant_user",
            EntityKind::Role => "role",
            EntityKind::UserRole => "user_role",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "product" => Some(EntityKind::Product),
            "category" => Some(EntityKind::Category),
            "supplier" => Some(EntityKind::Supplier),
            "customer" => Some(EntityKind::Customer),
            "order" => Some(EntityKind::Order),
            "stock_movement" => Some(EntityKind::StockMovement),
            "tenant_user" => Some(EntityKind::TenantUser),
            "role" => Some(EntityKind::Role),
            "user_role" => Some(EntityKind::UserRole),
            _ => None,
        }
    }

    /// Name written to `AuditLogEntry::entity_type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Product => "Product",
            EntityKind::Category => "Category",
            EntityKind::Supplier => "Supplier",
            EntityKind::Customer => "Customer",
            EntityKind::Order => "Order",
            EntityKind::StockMovement => "StockMovement",
            EntityKind::TenantUser => "TenantUser",
            EntityKind::Role => "Role",
            EntityKind::UserRole => "UserRole",
        }
    }

    /// Fixed allow-list of audited kinds.
    pub fn is_audited(&self) -> bool {
        matches!(
            self,
            EntityKind::Product
                | EntityKind::Order
                | EntityKind::StockMovement
                | EntityKind::Customer
                | EntityKind::Supplier
        )
    }
}

/// A business entity owned by exactly one tenant.
///
/// Implementors serialize their [`AuditFields`] flattened so that the
/// bookkeeping columns appear as top-level fields of the stored document.
pub trait TenantScoped: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    /// `None` means "unset": the gate stamps it on create.
    fn tenant_id(&self) -> Option<TenantId>;
    fn set_tenant_id(&mut self, tenant_id: TenantId);
    fn audit(&self) -> &AuditFields;
    fn audit_mut(&mut self) -> &mut AuditFields;

    fn is_deleted(&self) -> bool {
        self.audit().is_deleted()
    }
}

/// Many-to-many join rows. The only rows that may be hard-deleted.
pub trait LinkRecord: TenantScoped {}

macro_rules! impl_tenant_scoped {
    ($ty:ty, $kind:expr) => {
        impl $crate::domain::entity::TenantScoped for $ty {
            const KIND: $crate::domain::entity::EntityKind = $kind;

            fn id(&self) -> stockhub_shared::EntityId {
                self.id
            }

            fn tenant_id(&self) -> Option<$crate::domain::TenantId> {
                self.tenant_id
            }

            fn set_tenant_id(&mut self, tenant_id: $crate::domain::TenantId) {
                self.tenant_id = Some(tenant_id);
            }

            fn audit(&self) -> &stockhub_shared::AuditFields {
                &self.audit
            }

            fn audit_mut(&mut self) -> &mut stockhub_shared::AuditFields {
                &mut self.audit
            }
        }
    };
}

pub(crate) use impl_tenant_scoped;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audited_allow_list() {
        assert!(EntityKind::Product.is_audited());
        assert!(EntityKind::StockMovement.is_audited());
        assert!(!EntityKind::Category.is_audited());
        assert!(!EntityKind::UserRole.is_audited());
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [EntityKind::Product, EntityKind::TenantUser, EntityKind::UserRole] {
            assert_eq!(EntityKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_str("tenant"), None);
    }
}
