// ============================================================================
// StockHub Core - Audit Log Entry
// File: crates/stockhub-core/src/domain/audit_log.rs
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use stockhub_shared::{new_id, EntityId};

use super::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Modified,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Modified => "modified",
            AuditAction::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(AuditAction::Created),
            "modified" => Some(AuditAction::Modified),
            "deleted" => Some(AuditAction::Deleted),
            _ => None,
        }
    }
}

/// Immutable record of one mutation. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: EntityId,
    pub tenant_id: TenantId,
    /// Acting user id, or `"System"`.
    pub user_id: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: EntityId,
    /// Changed fields before the modification. Modifications only.
    pub old_values: Option<Map<String, Value>>,
    /// Changed fields after the modification. Modifications only.
    pub new_values: Option<Map<String, Value>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        tenant_id: TenantId,
        user_id: String,
        action: AuditAction,
        entity_type: &str,
        entity_id: EntityId,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id,
            user_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }
}
