use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use stockhub_shared::{EntityId, Pagination};

use crate::domain::{AuditLogEntry, EntityKind, TenantId};
use crate::error::DomainError;
use crate::repositories::{ChangeBatch, EntityStore, RowWrite, StoredRow, WriteGuard};
use crate::tenancy::query::SortDirection;
use crate::tenancy::ScopedQuery;

#[derive(Debug, Default)]
struct StoreState {
    /// Row plus its insertion sequence, used as the default order.
    rows: HashMap<(EntityKind, EntityId), (u64, StoredRow)>,
    next_seq: u64,
    audit_log: Vec<AuditLogEntry>,
}

/// Entity store backed by one lock; a batch is validated in full before
/// any of it is applied.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    state: RwLock<StoreState>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a row without going through the gate. Test fixtures only.
    pub fn seed(&self, row: StoredRow) {
        let mut state = self.state.write();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.insert((row.kind, row.id), (seq, row));
    }

    pub fn audit_len(&self) -> usize {
        self.state.read().audit_log.len()
    }

    fn validate(state: &StoreState, batch: &ChangeBatch) -> Result<(), DomainError> {
        for write in &batch.writes {
            match write {
                RowWrite::Insert(row) => {
                    if state.rows.contains_key(&(row.kind, row.id)) {
                        return Err(DomainError::DatabaseError(format!(
                            "duplicate key {} {}",
                            row.kind.as_str(),
                            row.id
                        )));
                    }
                }
                RowWrite::Update(row) => {
                    Self::expect_owned(state, row.kind, row.id, row.tenant_id)?;
                    // Replacements only apply to rows still live at commit.
                    if state.rows.get(&(row.kind, row.id)).is_some_and(|(_, existing)| existing.deleted) {
                        return Err(DomainError::not_found(row.kind.type_name(), row.id));
                    }
                }
                RowWrite::Delete { kind, id, tenant_id } => {
                    Self::expect_owned(state, *kind, *id, *tenant_id)?;
                }
            }
        }
        Ok(())
    }

    /// Evaluate guards against the state as it would be after the batch.
    fn check_guards(state: &StoreState, batch: &ChangeBatch) -> Result<(), DomainError> {
        if batch.guards.is_empty() {
            return Ok(());
        }
        let touched: HashSet<(EntityKind, EntityId)> =
            batch.writes.iter().map(|w| (w.kind(), w.id())).collect();
        let staged = batch.writes.iter().filter_map(|w| match w {
            RowWrite::Insert(row) | RowWrite::Update(row) => Some(row),
            RowWrite::Delete { .. } => None,
        });
        let projected: Vec<&StoredRow> = state
            .rows
            .values()
            .map(|(_, row)| row)
            .filter(|row| !touched.contains(&(row.kind, row.id)))
            .chain(staged)
            .collect();

        for guard in &batch.guards {
            let matching = projected.iter().filter(|row| guard.matches(row)).count() as u64;
            if matching > guard.threshold() {
                return Err(guard.rejection(matching));
            }
        }
        Ok(())
    }

    fn expect_owned(
        state: &StoreState,
        kind: EntityKind,
        id: EntityId,
        tenant_id: TenantId,
    ) -> Result<(), DomainError> {
        match state.rows.get(&(kind, id)) {
            Some((_, existing)) if existing.tenant_id == tenant_id => Ok(()),
            Some(_) => Err(DomainError::isolation(
                kind.type_name(),
                format!("row {} belongs to another tenant", id),
            )),
            None => Err(DomainError::not_found(kind.type_name(), id)),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            // Decimals are serialized as strings.
            match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn apply_page<T>(items: Vec<T>, page: Option<Pagination>) -> Vec<T> {
    match page {
        Some(page) => items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect(),
        None => items,
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn fetch(&self, query: &ScopedQuery) -> Result<Vec<StoredRow>, DomainError> {
        let state = self.state.read();
        let mut matched: Vec<&(u64, StoredRow)> = state
            .rows
            .values()
            .filter(|(_, row)| query.matches(row))
            .collect();

        match query.order() {
            Some(order) => matched.sort_by(|(sa, a), (sb, b)| {
                let null = Value::Null;
                let left = a.data.get(&order.field).unwrap_or(&null);
                let right = b.data.get(&order.field).unwrap_or(&null);
                let ord = match order.direction {
                    SortDirection::Asc => compare_values(left, right),
                    SortDirection::Desc => compare_values(right, left),
                };
                ord.then(sa.cmp(sb))
            }),
            None => matched.sort_by_key(|(seq, _)| *seq),
        }

        let rows = matched.into_iter().map(|(_, row)| row.clone()).collect();
        Ok(apply_page(rows, query.page()))
    }

    async fn count(&self, query: &ScopedQuery) -> Result<u64, DomainError> {
        let state = self.state.read();
        Ok(state
            .rows
            .values()
            .filter(|(_, row)| query.matches(row))
            .count() as u64)
    }

    async fn load_row(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredRow>, DomainError> {
        Ok(self
            .state
            .read()
            .rows
            .get(&(kind, id))
            .map(|(_, row)| row.clone()))
    }

    async fn commit(&self, batch: ChangeBatch) -> Result<(), DomainError> {
        let mut state = self.state.write();
        let checked = Self::validate(&state, &batch).and_then(|_| Self::check_guards(&state, &batch));
        if let Err(e) = checked {
            warn!(error = %e, "Change batch rejected, nothing applied");
            return Err(e);
        }

        let writes = batch.writes.len();
        for write in batch.writes {
            match write {
                RowWrite::Insert(row) => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.rows.insert((row.kind, row.id), (seq, row));
                }
                RowWrite::Update(row) => {
                    if let Some(slot) = state.rows.get_mut(&(row.kind, row.id)) {
                        slot.1 = row;
                    }
                }
                RowWrite::Delete { kind, id, .. } => {
                    state.rows.remove(&(kind, id));
                }
            }
        }
        let entries = batch.audit_entries.len();
        state.audit_log.extend(batch.audit_entries);
        debug!(writes, audit_entries = entries, "Change batch committed");
        Ok(())
    }

    async fn audit_entries(
        &self,
        tenant_id: TenantId,
        entity: Option<(EntityKind, EntityId)>,
        page: Pagination,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let state = self.state.read();
        let entries: Vec<AuditLogEntry> = state
            .audit_log
            .iter()
            .rev()
            .filter(|entry| entry.tenant_id == tenant_id)
            .filter(|entry| match entity {
                Some((kind, id)) => entry.entity_type == kind.type_name() && entry.entity_id == id,
                None => true,
            })
            .cloned()
            .collect();
        Ok(apply_page(entries, Some(page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuditAction, Product};
    use crate::tenancy::query::Query;
    use serde_json::json;
    use uuid::Uuid;

    fn row(tenant_id: TenantId, name: &str, price: &str) -> StoredRow {
        StoredRow {
            kind: EntityKind::Product,
            id: Uuid::new_v4(),
            tenant_id,
            deleted: false,
            data: json!({ "name": name, "price": price }),
        }
    }

    #[tokio::test]
    async fn test_batch_with_invalid_write_applies_nothing() {
        let store = InMemoryEntityStore::new();
        let tenant = TenantId::new();
        let fresh = row(tenant, "Widget", "1.00");
        let missing = row(tenant, "Ghost", "2.00");

        let batch = ChangeBatch {
            writes: vec![RowWrite::Insert(fresh.clone()), RowWrite::Update(missing)],
            audit_entries: vec![AuditLogEntry::new(
                tenant,
                "System".to_string(),
                AuditAction::Created,
                "Product",
                fresh.id,
            )],
            guards: Vec::new(),
        };

        assert!(store.commit(batch).await.is_err());
        assert!(store.load_row(EntityKind::Product, fresh.id).await.unwrap().is_none());
        assert_eq!(store.audit_len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_orders_decimal_strings_numerically() {
        let store = InMemoryEntityStore::new();
        let tenant = TenantId::new();
        store.seed(row(tenant, "B", "10.00"));
        store.seed(row(tenant, "A", "9.50"));
        store.seed(row(TenantId::new(), "C", "1.00"));

        let query = ScopedQuery::bind(
            tenant,
            Query::<Product>::new().order_by("price", SortDirection::Asc),
        )
        .unwrap();
        let rows = store.fetch(&query).await.unwrap();

        let names: Vec<&str> = rows.iter().filter_map(|r| r.data["name"].as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(store.count(&query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stale_update_cannot_revive_deleted_row() {
        let store = InMemoryEntityStore::new();
        let tenant = TenantId::new();
        let mut deleted = row(tenant, "Widget", "1.00");
        deleted.deleted = true;
        store.seed(deleted.clone());

        let mut stale = deleted.clone();
        stale.deleted = false;
        let batch = ChangeBatch {
            writes: vec![RowWrite::Update(stale)],
            ..Default::default()
        };

        assert!(matches!(
            store.commit(batch).await,
            Err(DomainError::EntityNotFound { .. })
        ));
        assert!(store.load_row(EntityKind::Product, deleted.id).await.unwrap().unwrap().deleted);
    }

    fn guarded_insert(row: StoredRow, guard: WriteGuard) -> ChangeBatch {
        ChangeBatch {
            writes: vec![RowWrite::Insert(row)],
            audit_entries: Vec::new(),
            guards: vec![guard],
        }
    }

    #[tokio::test]
    async fn test_row_limit_guard_sees_rows_committed_after_the_check() {
        let store = InMemoryEntityStore::new();
        let tenant = TenantId::new();
        for i in 0..9 {
            store.seed(row(tenant, &format!("P{i}"), "1.00"));
        }
        let limit = WriteGuard::RowLimit {
            tenant_id: tenant,
            kind: EntityKind::Product,
            resource: crate::domain::ResourceKind::Product,
            max: 10,
        };

        // Both writers checked the count at 9; only the first commit fits.
        store
            .commit(guarded_insert(row(tenant, "P9", "1.00"), limit.clone()))
            .await
            .unwrap();
        let late = row(tenant, "P10", "1.00");
        let err = store
            .commit(guarded_insert(late.clone(), limit.clone()))
            .await
            .unwrap_err();

        match err {
            DomainError::QuotaExceeded(rejection) => assert_eq!(rejection.current, 10),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.load_row(EntityKind::Product, late.id).await.unwrap().is_none());

        // Another tenant's rows and deleted rows do not count.
        let mut gone = row(tenant, "Old", "1.00");
        gone.deleted = true;
        store.seed(gone);
        let other = TenantId::new();
        let other_limit = WriteGuard::RowLimit {
            tenant_id: other,
            kind: EntityKind::Product,
            resource: crate::domain::ResourceKind::Product,
            max: 10,
        };
        store
            .commit(guarded_insert(row(other, "X", "1.00"), other_limit))
            .await
            .unwrap();
        assert!(matches!(
            store.commit(guarded_insert(row(tenant, "P10", "1.00"), limit)).await,
            Err(DomainError::QuotaExceeded(_))
        ));
    }

    #[tokio::test]
    async fn test_unique_guard_rejects_second_live_value() {
        let store = InMemoryEntityStore::new();
        let tenant = TenantId::new();
        let guard = WriteGuard::Unique {
            tenant_id: tenant,
            kind: EntityKind::Product,
            field: "name".to_string(),
            value: json!("Widget"),
        };

        store
            .commit(guarded_insert(row(tenant, "Widget", "1.00"), guard.clone()))
            .await
            .unwrap();
        assert!(matches!(
            store.commit(guarded_insert(row(tenant, "Widget", "2.00"), guard.clone())).await,
            Err(DomainError::ValidationError(_))
        ));
        let other = TenantId::new();
        let other_guard = WriteGuard::Unique {
            tenant_id: other,
            kind: EntityKind::Product,
            field: "name".to_string(),
            value: json!("Widget"),
        };
        store
            .commit(guarded_insert(row(other, "Widget", "1.00"), other_guard))
            .await
            .unwrap();
    }
}
