// ============================================================================
// StockHub Core - Stock Movement Entity
// File: crates/stockhub-core/src/domain/stock.rs
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockhub_shared::{new_id, AuditFields, EntityId};

use super::entity::{impl_tenant_scoped, EntityKind};
use super::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Received,
    Sold,
    Damaged,
    Lost,
    Found,
    Returned,
    Expired,
    StockCount,
    Other,
}

/// A single stock quantity change against one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: EntityId,
    pub tenant_id: Option<TenantId>,
    pub product_id: Uuid,
    pub quantity_before: i32,
    pub quantity_change: i32,
    pub quantity_after: i32,
    pub reason: MovementReason,
    pub notes: Option<String>,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl StockMovement {
    pub fn new(product_id: Uuid, quantity_before: i32, quantity_change: i32, reason: MovementReason) -> Self {
        Self {
            id: new_id(),
            tenant_id: None,
            product_id,
            quantity_before,
            quantity_change,
            quantity_after: quantity_before + quantity_change,
            reason,
            notes: None,
            audit: AuditFields::default(),
        }
    }
}

impl_tenant_scoped!(StockMovement, EntityKind::StockMovement);
