// ============================================================================
// StockHub Infrastructure - PostgreSQL Entity Store
// File: crates/stockhub-infrastructure/src/database/postgres/entity_store_impl.rs
// Description: Tenant-scoped JSONB records and the audit log
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use stockhub_core::domain::{AuditAction, AuditLogEntry, EntityKind, TenantId};
use stockhub_core::error::DomainError;
use stockhub_core::repositories::{ChangeBatch, EntityStore, RowWrite, StoredRow, WriteGuard};
use stockhub_core::tenancy::{FilterOp, ScopedQuery, SortDirection};
use stockhub_shared::{EntityId, Pagination};

pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    error!("Database error {}: {}", context, e);
    DomainError::DatabaseError(e.to_string())
}

#[derive(Debug, FromRow)]
struct RecordRow {
    pub kind: String,
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub deleted: bool,
    pub data: Value,
}

impl TryFrom<RecordRow> for StoredRow {
    type Error = DomainError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let kind = EntityKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::DatabaseError(format!("unknown record kind: {}", row.kind)))?;
        let tenant_id = TenantId::from_uuid(row.tenant_id)
            .ok_or_else(|| DomainError::DatabaseError(format!("record {} has nil tenant", row.id)))?;
        Ok(StoredRow {
            kind,
            id: row.id,
            tenant_id,
            deleted: row.deleted,
            data: row.data,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<Json<Map<String, Value>>>,
    pub new_values: Option<Json<Map<String, Value>>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::from_str(&row.action)
            .ok_or_else(|| DomainError::DatabaseError(format!("unknown audit action: {}", row.action)))?;
        let tenant_id = TenantId::from_uuid(row.tenant_id)
            .ok_or_else(|| DomainError::DatabaseError(format!("audit entry {} has nil tenant", row.id)))?;
        Ok(AuditLogEntry {
            id: row.id,
            tenant_id,
            user_id: row.user_id,
            action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            old_values: row.old_values.map(|v| v.0),
            new_values: row.new_values.map(|v| v.0),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            timestamp: row.timestamp,
        })
    }
}

/// `WHERE` clause shared by fetch and count. The tenant and deletion
/// predicates come first and are never optional.
fn push_scope(qb: &mut QueryBuilder<'static, Postgres>, query: &ScopedQuery) {
    qb.push(" WHERE kind = ")
        .push_bind(query.kind().as_str())
        .push(" AND tenant_id = ")
        .push_bind(query.tenant_id().as_uuid())
        .push(" AND deleted = FALSE");

    for filter in query.filters() {
        match filter.op {
            FilterOp::Eq => {
                qb.push(" AND data -> ")
                    .push_bind(filter.field.clone())
                    .push(" = ")
                    .push_bind(Json(filter.value.clone()));
            }
            FilterOp::Ne => {
                qb.push(" AND data -> ")
                    .push_bind(filter.field.clone())
                    .push(" IS DISTINCT FROM ")
                    .push_bind(Json(filter.value.clone()));
            }
            FilterOp::Contains => {
                let text = filter.value.as_str().unwrap_or_default();
                qb.push(" AND data ->> ")
                    .push_bind(filter.field.clone())
                    .push(" ILIKE ")
                    .push_bind(format!("%{}%", escape_like(text)));
            }
        }
    }
}

fn select_query(query: &ScopedQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT kind, id, tenant_id, deleted, data FROM tenant_records");
    push_scope(&mut qb, query);

    match query.order() {
        Some(order) => {
            qb.push(" ORDER BY data -> ").push_bind(order.field.clone());
            qb.push(match order.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
            qb.push(", seq");
        }
        None => {
            qb.push(" ORDER BY seq");
        }
    }

    if let Some(page) = query.page() {
        qb.push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
    }
    qb
}

fn count_query(query: &ScopedQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tenant_records");
    push_scope(&mut qb, query);
    qb
}

/// Live rows a guard counts, read inside the committing transaction.
fn guard_query(guard: &WriteGuard) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tenant_records WHERE kind = ");
    qb.push_bind(guard.kind().as_str())
        .push(" AND tenant_id = ")
        .push_bind(guard.tenant_id().as_uuid())
        .push(" AND deleted = FALSE");

    if let WriteGuard::Unique { field, value, .. } = guard {
        qb.push(" AND data -> ")
            .push_bind(field.clone())
            .push(" = ")
            .push_bind(Json(value.clone()));
    }
    qb
}

/// Guarded `(tenant, kind)` pairs in a fixed order, so concurrent commits
/// take their advisory locks without deadlocking.
fn guard_lock_keys(guards: &[WriteGuard]) -> Vec<(String, &'static str)> {
    let mut keys: Vec<(String, &'static str)> = guards
        .iter()
        .map(|g| (g.tenant_id().to_string(), g.kind().as_str()))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Only live rows are replaced; a row soft-deleted since it was loaded
/// stays deleted.
const UPDATE_RECORD_SQL: &str = r#"
    UPDATE tenant_records
    SET deleted = $4, data = $5
    WHERE kind = $1 AND id = $2 AND tenant_id = $3 AND deleted = FALSE
"#;

const AUDIT_ORDER_SQL: &str = r#" ORDER BY "timestamp" DESC, seq DESC LIMIT "#;

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn fetch(&self, query: &ScopedQuery) -> Result<Vec<StoredRow>, DomainError> {
        let mut qb = select_query(query);
        let rows: Vec<RecordRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("fetching records", e))?;

        debug!(
            tenant_id = %query.tenant_id(),
            kind = query.kind().as_str(),
            rows = rows.len(),
            "Scoped fetch"
        );
        rows.into_iter().map(StoredRow::try_from).collect()
    }

    async fn count(&self, query: &ScopedQuery) -> Result<u64, DomainError> {
        let mut qb = count_query(query);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting records", e))?;

        Ok(count.max(0) as u64)
    }

    async fn load_row(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredRow>, DomainError> {
        let row: Option<RecordRow> = sqlx::query_as(
            r#"
            SELECT kind, id, tenant_id, deleted, data
            FROM tenant_records
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading record", e))?;

        row.map(StoredRow::try_from).transpose()
    }

    async fn commit(&self, batch: ChangeBatch) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("starting transaction", e))?;

        for (tenant_id, kind) in guard_lock_keys(&batch.guards) {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
                .bind(tenant_id)
                .bind(kind)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("locking guarded rows", e))?;
        }

        for write in &batch.writes {
            match write {
                RowWrite::Insert(row) => {
                    sqlx::query(
                        r#"
                        INSERT INTO tenant_records (kind, id, tenant_id, deleted, data)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(row.kind.as_str())
                    .bind(row.id)
                    .bind(row.tenant_id.as_uuid())
                    .bind(row.deleted)
                    .bind(Json(&row.data))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("inserting record", e))?;
                }
                RowWrite::Update(row) => {
                    let result = sqlx::query(UPDATE_RECORD_SQL)
                        .bind(row.kind.as_str())
                        .bind(row.id)
                        .bind(row.tenant_id.as_uuid())
                        .bind(row.deleted)
                        .bind(Json(&row.data))
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| db_error("updating record", e))?;

                    if result.rows_affected() != 1 {
                        return Err(DomainError::not_found(row.kind.type_name(), row.id));
                    }
                }
                RowWrite::Delete { kind, id, tenant_id } => {
                    let result = sqlx::query(
                        r#"DELETE FROM tenant_records WHERE kind = $1 AND id = $2 AND tenant_id = $3"#,
                    )
                    .bind(kind.as_str())
                    .bind(id)
                    .bind(tenant_id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("deleting record", e))?;

                    if result.rows_affected() != 1 {
                        return Err(DomainError::not_found(kind.type_name(), *id));
                    }
                }
            }
        }

        for guard in &batch.guards {
            let matching: i64 = guard_query(guard)
                .build_query_scalar()
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| db_error("checking write guard", e))?;

            let matching = matching.max(0) as u64;
            if matching > guard.threshold() {
                warn!(
                    tenant_id = %guard.tenant_id(),
                    kind = guard.kind().as_str(),
                    matching,
                    "Write guard failed, rolling back"
                );
                return Err(guard.rejection(matching));
            }
        }

        for entry in &batch.audit_entries {
            sqlx::query(
                r#"
                INSERT INTO audit_logs (
                    id, tenant_id, user_id, action, entity_type, entity_id,
                    old_values, new_values, ip_address, user_agent, "timestamp"
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(entry.id)
            .bind(entry.tenant_id.as_uuid())
            .bind(&entry.user_id)
            .bind(entry.action.as_str())
            .bind(&entry.entity_type)
            .bind(entry.entity_id)
            .bind(entry.old_values.as_ref().map(Json))
            .bind(entry.new_values.as_ref().map(Json))
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::AuditError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("committing transaction", e))?;

        info!(
            writes = batch.writes.len(),
            audit_entries = batch.audit_entries.len(),
            "Change batch committed"
        );
        Ok(())
    }

    async fn audit_entries(
        &self,
        tenant_id: TenantId,
        entity: Option<(EntityKind, EntityId)>,
        page: Pagination,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT id, tenant_id, user_id, action, entity_type, entity_id,
                   old_values, new_values, ip_address, user_agent, "timestamp"
            FROM audit_logs
            WHERE tenant_id = "#,
        );
        qb.push_bind(tenant_id.as_uuid());

        if let Some((kind, id)) = entity {
            qb.push(" AND entity_type = ")
                .push_bind(kind.type_name())
                .push(" AND entity_id = ")
                .push_bind(id);
        }

        qb.push(AUDIT_ORDER_SQL)
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows: Vec<AuditRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("reading audit log", e))?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use stockhub_core::domain::{Product, ResourceKind};
    use stockhub_core::repositories::InMemoryEntityStore;
    use stockhub_core::tenancy::{Actor, IsolationGate, Query, RequestContext};

    const BASELINE: &str = " WHERE kind = $1 AND tenant_id = $2 AND deleted = FALSE";

    fn scoped(query: Query<Product>) -> ScopedQuery {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let ctx = RequestContext::for_tenant(TenantId::new(), Actor::System);
        gate.scope(&ctx, query).unwrap()
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_scope_predicates_lead_every_read() {
        let plain = scoped(Query::new());
        assert_eq!(
            select_query(&plain).sql(),
            format!("SELECT kind, id, tenant_id, deleted, data FROM tenant_records{} ORDER BY seq", BASELINE)
        );
        assert_eq!(
            count_query(&plain).sql(),
            format!("SELECT COUNT(*) FROM tenant_records{}", BASELINE)
        );
    }

    #[test]
    fn test_caller_filters_cannot_widen_the_scope() {
        let sneaky = scoped(
            Query::new()
                .eq("tenant_id", TenantId::new())
                .ne("deleted", false)
                .contains("name", "w"),
        );

        for sql in [select_query(&sneaky).sql().to_string(), count_query(&sneaky).sql().to_string()] {
            let where_clause = sql.split_once(" WHERE ").map(|(_, rest)| rest).unwrap();
            assert!(where_clause.starts_with("kind = $1 AND tenant_id = $2 AND deleted = FALSE AND "));
            assert!(!where_clause.contains(" OR "));
            assert!(sql.contains("AND data -> $3 = $4"));
            assert!(sql.contains("AND data -> $5 IS DISTINCT FROM $6"));
            assert!(sql.contains("AND data ->> $7 ILIKE $8"));
        }
    }

    #[test]
    fn test_ordering_and_paging_follow_the_scope() {
        let query = scoped(
            Query::new()
                .order_by("price", SortDirection::Desc)
                .paginate(Pagination::new(2, 20)),
        );
        assert!(select_query(&query)
            .sql()
            .ends_with(" ORDER BY data -> $3 DESC, seq LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn test_guard_queries_count_live_rows_of_one_tenant() {
        let tenant_id = TenantId::new();
        let limit = WriteGuard::RowLimit {
            tenant_id,
            kind: EntityKind::Product,
            resource: ResourceKind::Product,
            max: 10,
        };
        let unique = WriteGuard::Unique {
            tenant_id,
            kind: EntityKind::TenantUser,
            field: "email".to_string(),
            value: json!("a@acme.io"),
        };

        assert_eq!(
            guard_query(&limit).sql(),
            "SELECT COUNT(*) FROM tenant_records WHERE kind = $1 AND tenant_id = $2 AND deleted = FALSE"
        );
        assert!(guard_query(&unique).sql().ends_with(" AND deleted = FALSE AND data -> $3 = $4"));

        let keys = guard_lock_keys(&[unique.clone(), limit.clone(), limit]);
        assert_eq!(keys.len(), 2);
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_updates_only_touch_live_rows() {
        assert!(UPDATE_RECORD_SQL.contains("AND deleted = FALSE"));
        assert!(AUDIT_ORDER_SQL.contains("seq DESC"));
    }
}
