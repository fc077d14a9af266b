// ============================================================================
// StockHub Core - Audit Recorder
// File: crates/stockhub-core/src/tenancy/audit.rs
// Description: Turns a unit of work's change set into audit log entries
// ============================================================================

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use stockhub_shared::EntityId;

use crate::domain::{AuditAction, AuditLogEntry, EntityKind, TenantId};
use crate::error::DomainError;
use crate::repositories::RowWrite;
use crate::tenancy::context::RequestContext;

/// Fields never included in a modification diff.
const DIFF_EXCLUDED_FIELDS: &[&str] = &["modified_at", "modified_by"];

/// One entity mutation staged in a unit of work.
#[derive(Debug, Clone)]
pub struct Change {
    pub action: AuditAction,
    pub kind: EntityKind,
    pub entity_id: EntityId,
    /// Stored document before the mutation. Absent for creations.
    pub before: Option<Value>,
    pub write: RowWrite,
}

impl Change {
    fn after(&self) -> Option<&Value> {
        match &self.write {
            RowWrite::Insert(row) | RowWrite::Update(row) => Some(&row.data),
            RowWrite::Delete { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    pub fn new() -> Self {
        Self
    }

    /// One entry per audited change, in change order.
    pub fn record(
        &self,
        ctx: &RequestContext,
        tenant_id: TenantId,
        changes: &[Change],
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let mut entries = Vec::new();
        for change in changes.iter().filter(|c| c.kind.is_audited()) {
            let mut entry = AuditLogEntry::new(
                tenant_id,
                ctx.actor().to_string(),
                change.action,
                change.kind.type_name(),
                change.entity_id,
            );
            entry.timestamp = now;
            entry.ip_address = ctx.metadata().ip_address.map(|ip| ip.to_string());
            entry.user_agent = ctx.metadata().user_agent.clone();

            if change.action == AuditAction::Modified {
                let (before, after) = match (change.before.as_ref(), change.after()) {
                    (Some(Value::Object(before)), Some(Value::Object(after))) => (before, after),
                    _ => {
                        return Err(DomainError::AuditError(format!(
                            "{} {} has no before/after snapshot",
                            change.kind.type_name(),
                            change.entity_id
                        )))
                    }
                };
                let (old_values, new_values) = diff_fields(before, after);
                entry.old_values = Some(old_values);
                entry.new_values = Some(new_values);
            }

            entries.push(entry);
        }

        debug!(
            tenant_id = %tenant_id,
            changes = changes.len(),
            entries = entries.len(),
            "Audit entries prepared"
        );
        Ok(entries)
    }
}

/// Parallel maps holding only the fields whose value changed.
pub fn diff_fields(
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut old_values = Map::new();
    let mut new_values = Map::new();

    let keys = before.keys().chain(after.keys().filter(|k| !before.contains_key(*k)));
    for key in keys {
        if DIFF_EXCLUDED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let old = before.get(key).unwrap_or(&Value::Null);
        let new = after.get(key).unwrap_or(&Value::Null);
        if old != new {
            old_values.insert(key.clone(), old.clone());
            new_values.insert(key.clone(), new.clone());
        }
    }

    (old_values, new_values)
}
