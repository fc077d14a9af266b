// ============================================================================
// StockHub Core - Isolation Gate
// File: crates/stockhub-core/src/tenancy/gate.rs
// Description: The single path for tenant-scoped reads and writes
// ============================================================================
//! Every read is narrowed to `tenant == current && !deleted` through a
//! [`ScopedQuery`]. Every write is staged in a [`UnitOfWork`], which stamps
//! the owning tenant and bookkeeping fields, checks ownership of existing
//! rows, and commits the rows together with their audit entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use stockhub_shared::{EntityId, Pagination};

use crate::domain::{
    AuditAction, AuditLogEntry, EntityKind, Limit, LinkRecord, ResourceKind, TenantId, TenantScoped,
};
use crate::error::DomainError;
use crate::repositories::{ChangeBatch, EntityStore, RowWrite, StoredRow, WriteGuard};
use crate::tenancy::audit::{AuditRecorder, Change};
use crate::tenancy::context::RequestContext;
use crate::tenancy::query::{Query, ScopedQuery};

fn violation(kind: EntityKind, tenant_id: TenantId, detail: String) -> DomainError {
    error!(
        isolation_violation = true,
        tenant_id = %tenant_id,
        entity = kind.type_name(),
        detail = %detail,
        "Isolation violation"
    );
    DomainError::isolation(kind.type_name(), detail)
}

fn to_row<T: TenantScoped>(entity: &T, tenant_id: TenantId) -> Result<StoredRow, DomainError> {
    Ok(StoredRow {
        kind: T::KIND,
        id: entity.id(),
        tenant_id,
        deleted: entity.is_deleted(),
        data: serde_json::to_value(entity)?,
    })
}

fn from_row<T: TenantScoped>(row: &StoredRow) -> Result<T, DomainError> {
    Ok(serde_json::from_value(row.data.clone())?)
}

pub struct IsolationGate {
    store: Arc<dyn EntityStore>,
    recorder: AuditRecorder,
}

impl IsolationGate {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            recorder: AuditRecorder::new(),
        }
    }

    pub fn scope<T: TenantScoped>(&self, ctx: &RequestContext, query: Query<T>) -> Result<ScopedQuery, DomainError> {
        ScopedQuery::bind(ctx.tenant_id()?, query)
    }

    pub async fn find<T: TenantScoped>(&self, ctx: &RequestContext, query: Query<T>) -> Result<Vec<T>, DomainError> {
        let scoped = self.scope(ctx, query)?;
        let rows = self.store.fetch(&scoped).await?;

        // The store is not trusted to have honoured the scope.
        rows.iter()
            .map(|row| {
                if row.tenant_id != scoped.tenant_id() || row.deleted {
                    return Err(violation(
                        T::KIND,
                        scoped.tenant_id(),
                        format!("store returned out-of-scope row {}", row.id),
                    ));
                }
                from_row(row)
            })
            .collect()
    }

    pub async fn find_by_id<T: TenantScoped>(&self, ctx: &RequestContext, id: EntityId) -> Result<Option<T>, DomainError> {
        let mut found = self.find(ctx, Query::<T>::new().eq("id", id)).await?;
        Ok(found.pop())
    }

    pub async fn get<T: TenantScoped>(&self, ctx: &RequestContext, id: EntityId) -> Result<T, DomainError> {
        self.find_by_id(ctx, id)
            .await?
            .ok_or_else(|| DomainError::not_found(T::KIND.type_name(), id))
    }

    pub async fn count<T: TenantScoped>(&self, ctx: &RequestContext, query: Query<T>) -> Result<u64, DomainError> {
        let scoped = self.scope(ctx, query)?;
        self.store.count(&scoped).await
    }

    /// Active rows of `T` owned by `tenant_id`, for quota checks made
    /// outside a request.
    pub(crate) async fn count_for_tenant<T: TenantScoped>(&self, tenant_id: TenantId) -> Result<u64, DomainError> {
        let scoped = ScopedQuery::bind(tenant_id, Query::<T>::new())?;
        self.store.count(&scoped).await
    }

    pub fn unit_of_work<'a>(&'a self, ctx: &'a RequestContext) -> Result<UnitOfWork<'a>, DomainError> {
        Ok(UnitOfWork {
            gate: self,
            ctx,
            tenant_id: ctx.tenant_id()?,
            now: Utc::now(),
            changes: Vec::new(),
            guards: Vec::new(),
        })
    }

    pub async fn insert<T: TenantScoped>(&self, ctx: &RequestContext, entity: T) -> Result<T, DomainError> {
        let mut uow = self.unit_of_work(ctx)?;
        let stamped = uow.add(entity)?;
        uow.save().await?;
        Ok(stamped)
    }

    pub async fn update<T: TenantScoped>(&self, ctx: &RequestContext, entity: T) -> Result<T, DomainError> {
        let mut uow = self.unit_of_work(ctx)?;
        let stamped = uow.update(entity).await?;
        uow.save().await?;
        Ok(stamped)
    }

    pub async fn soft_delete<T: TenantScoped>(&self, ctx: &RequestContext, id: EntityId) -> Result<(), DomainError> {
        let mut uow = self.unit_of_work(ctx)?;
        uow.delete::<T>(id).await?;
        uow.save().await?;
        Ok(())
    }

    pub async fn hard_delete_link<T: LinkRecord>(&self, ctx: &RequestContext, id: EntityId) -> Result<(), DomainError> {
        let mut uow = self.unit_of_work(ctx)?;
        uow.unlink::<T>(id).await?;
        uow.save().await?;
        Ok(())
    }

    /// The current tenant's audit log, newest first.
    pub async fn audit_trail(
        &self,
        ctx: &RequestContext,
        entity: Option<(EntityKind, EntityId)>,
        page: Pagination,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let tenant_id = ctx.tenant_id()?;
        self.store.audit_entries(tenant_id, entity, page).await
    }
}

/// A set of staged writes for one tenant, saved atomically with their
/// audit entries.
pub struct UnitOfWork<'a> {
    gate: &'a IsolationGate,
    ctx: &'a RequestContext,
    tenant_id: TenantId,
    now: DateTime<Utc>,
    changes: Vec<Change>,
    guards: Vec<WriteGuard>,
}

impl<'a> UnitOfWork<'a> {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Stage a new entity. An unset tenant is stamped; a foreign one is a
    /// violation.
    pub fn add<T: TenantScoped>(&mut self, mut entity: T) -> Result<T, DomainError> {
        match entity.tenant_id() {
            None => entity.set_tenant_id(self.tenant_id),
            Some(owner) if owner == self.tenant_id => {}
            Some(owner) => {
                return Err(violation(
                    T::KIND,
                    self.tenant_id,
                    format!("create tagged with foreign tenant {}", owner),
                ))
            }
        }

        let actor = self.ctx.actor().to_string();
        let audit = entity.audit_mut();
        audit.created_at = self.now;
        audit.created_by = Some(actor);
        audit.modified_at = None;
        audit.modified_by = None;

        let row = to_row(&entity, self.tenant_id)?;
        self.changes.push(Change {
            action: AuditAction::Created,
            kind: T::KIND,
            entity_id: entity.id(),
            before: None,
            write: RowWrite::Insert(row),
        });
        Ok(entity)
    }

    /// Have the store re-check, inside the commit, that live `T` rows stay
    /// within `limit`. Unlimited tiers add nothing.
    pub fn limit_rows<T: TenantScoped>(&mut self, resource: ResourceKind, limit: Limit) {
        if let Limit::Bounded(max) = limit {
            self.guards.push(WriteGuard::RowLimit {
                tenant_id: self.tenant_id,
                kind: T::KIND,
                resource,
                max,
            });
        }
    }

    /// Have the store re-check, inside the commit, that no other live `T`
    /// row holds the same `field` value.
    pub fn require_unique<T: TenantScoped>(&mut self, field: &str, value: impl Serialize) -> Result<(), DomainError> {
        self.guards.push(WriteGuard::Unique {
            tenant_id: self.tenant_id,
            kind: T::KIND,
            field: field.to_string(),
            value: serde_json::to_value(value)?,
        });
        Ok(())
    }

    /// Stage a full replacement of an existing, owned, live row.
    pub async fn update<T: TenantScoped>(&mut self, mut entity: T) -> Result<T, DomainError> {
        if let Some(owner) = entity.tenant_id() {
            if owner != self.tenant_id {
                return Err(violation(
                    T::KIND,
                    self.tenant_id,
                    format!("update of {} tagged with foreign tenant {}", entity.id(), owner),
                ));
            }
        }
        let existing = self.load_owned::<T>(entity.id()).await?;
        let previous: T = from_row(&existing)?;

        entity.set_tenant_id(self.tenant_id);
        let actor = self.ctx.actor().to_string();
        let audit = entity.audit_mut();
        audit.created_at = previous.audit().created_at;
        audit.created_by = previous.audit().created_by.clone();
        audit.removed_at = None;
        audit.removed_by = None;
        audit.modified_at = Some(self.now);
        audit.modified_by = Some(actor);

        let row = to_row(&entity, self.tenant_id)?;
        self.changes.push(Change {
            action: AuditAction::Modified,
            kind: T::KIND,
            entity_id: entity.id(),
            before: Some(existing.data),
            write: RowWrite::Update(row),
        });
        Ok(entity)
    }

    /// Stage a soft delete. The row stays in the store, flagged.
    pub async fn delete<T: TenantScoped>(&mut self, id: EntityId) -> Result<(), DomainError> {
        let existing = self.load_owned::<T>(id).await?;
        let mut entity: T = from_row(&existing)?;

        let actor = self.ctx.actor().to_string();
        let audit = entity.audit_mut();
        audit.removed_at = Some(self.now);
        audit.removed_by = Some(actor);

        let row = to_row(&entity, self.tenant_id)?;
        self.changes.push(Change {
            action: AuditAction::Deleted,
            kind: T::KIND,
            entity_id: id,
            before: Some(existing.data),
            write: RowWrite::Update(row),
        });
        Ok(())
    }

    /// Stage physical removal of a join row.
    pub async fn unlink<T: LinkRecord>(&mut self, id: EntityId) -> Result<(), DomainError> {
        let existing = self.load_owned::<T>(id).await?;
        self.changes.push(Change {
            action: AuditAction::Deleted,
            kind: T::KIND,
            entity_id: id,
            before: Some(existing.data),
            write: RowWrite::Delete {
                kind: T::KIND,
                id,
                tenant_id: self.tenant_id,
            },
        });
        Ok(())
    }

    /// Commit every staged write and its audit entries in one batch.
    pub async fn save(self) -> Result<usize, DomainError> {
        if self.changes.is_empty() {
            return Ok(0);
        }

        let audit_entries = self
            .gate
            .recorder
            .record(self.ctx, self.tenant_id, &self.changes, self.now)?;
        let applied = self.changes.len();
        let batch = ChangeBatch {
            writes: self.changes.into_iter().map(|c| c.write).collect(),
            audit_entries,
            guards: self.guards,
        };

        if let Err(e) = self.gate.store.commit(batch).await {
            error!(tenant_id = %self.tenant_id, error = %e, "Unit of work rolled back");
            return Err(e);
        }

        info!(tenant_id = %self.tenant_id, changes = applied, "Unit of work saved");
        Ok(applied)
    }

    async fn load_owned<T: TenantScoped>(&self, id: EntityId) -> Result<StoredRow, DomainError> {
        let row = self
            .gate
            .store
            .load_row(T::KIND, id)
            .await?
            .ok_or_else(|| DomainError::not_found(T::KIND.type_name(), id))?;

        if row.tenant_id != self.tenant_id {
            return Err(violation(
                T::KIND,
                self.tenant_id,
                format!("row {} is owned by another tenant", id),
            ));
        }
        if row.deleted {
            debug!(entity = T::KIND.type_name(), %id, "Write against deleted row");
            return Err(DomainError::not_found(T::KIND.type_name(), id));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Product, Role, TenantUser, TenantRole, UserRole};
    use crate::repositories::entity_store::MockEntityStore;
    use crate::repositories::InMemoryEntityStore;
    use crate::tenancy::context::Actor;
    use rust_decimal::Decimal;

    fn product(name: &str, price: Decimal) -> Product {
        Product::new(name.to_string(), None, price).unwrap()
    }

    fn ctx(tenant_id: TenantId) -> RequestContext {
        RequestContext::for_tenant(tenant_id, Actor::User("u-1".to_string()))
    }

    #[tokio::test]
    async fn test_reads_never_cross_tenants() {
        let store = Arc::new(InMemoryEntityStore::new());
        let gate = IsolationGate::new(store.clone());
        let t1 = ctx(TenantId::new());
        let t2 = ctx(TenantId::new());

        let mine = gate.insert(&t1, product("Widget", Decimal::ONE)).await.unwrap();
        gate.insert(&t2, product("Widget", Decimal::ONE)).await.unwrap();

        let seen = gate.find(&t2, Query::<Product>::new().eq("name", "Widget")).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0].id, mine.id);
        assert!(gate.find_by_id::<Product>(&t2, mine.id).await.unwrap().is_none());
        assert!(gate.find(&t2, Query::<Product>::new().eq("id", mine.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_stamps_unset_tenant_and_actor() {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let tenant_id = TenantId::new();
        let ctx = ctx(tenant_id);

        let created = gate.insert(&ctx, product("Widget", Decimal::ONE)).await.unwrap();
        let stored: Product = gate.get(&ctx, created.id).await.unwrap();

        assert_eq!(stored.tenant_id, Some(tenant_id));
        assert_eq!(stored.audit.created_by.as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_create_with_matching_tenant_passes_through() {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let tenant_id = TenantId::new();
        let mut category = Category::new("Tools".to_string(), None).unwrap();
        category.tenant_id = Some(tenant_id);

        let created = gate.insert(&ctx(tenant_id), category).await.unwrap();
        assert_eq!(created.tenant_id, Some(tenant_id));
    }

    #[tokio::test]
    async fn test_create_with_foreign_tenant_is_violation() {
        let store = Arc::new(InMemoryEntityStore::new());
        let gate = IsolationGate::new(store.clone());
        let mut item = product("Widget", Decimal::ONE);
        item.tenant_id = Some(TenantId::new());

        let err = gate.insert(&ctx(TenantId::new()), item).await.unwrap_err();
        assert!(err.is_isolation_violation());
        assert_eq!(store.audit_len(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_of_foreign_row_are_violations() {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let owner = ctx(TenantId::new());
        let intruder = ctx(TenantId::new());
        let created = gate.insert(&owner, product("Widget", Decimal::ONE)).await.unwrap();

        let mut tampered = created.clone();
        tampered.tenant_id = None;
        tampered.name = "Stolen".to_string();
        assert!(gate.update(&intruder, tampered).await.unwrap_err().is_isolation_violation());
        assert!(gate
            .soft_delete::<Product>(&intruder, created.id)
            .await
            .unwrap_err()
            .is_isolation_violation());

        let untouched: Product = gate.get(&owner, created.id).await.unwrap();
        assert_eq!(untouched.name, "Widget");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_row_but_keeps_it() {
        let store = Arc::new(InMemoryEntityStore::new());
        let gate = IsolationGate::new(store.clone());
        let ctx = ctx(TenantId::new());
        let created = gate.insert(&ctx, product("Widget", Decimal::ONE)).await.unwrap();

        gate.soft_delete::<Product>(&ctx, created.id).await.unwrap();

        assert!(gate.find_by_id::<Product>(&ctx, created.id).await.unwrap().is_none());
        let raw = store.load_row(EntityKind::Product, created.id).await.unwrap().unwrap();
        assert!(raw.deleted);
        assert!(matches!(
            gate.soft_delete::<Product>(&ctx, created.id).await,
            Err(DomainError::EntityNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_price_change_is_audited_with_diff() {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let ctx = ctx(TenantId::new());
        let mut item = gate
            .insert(&ctx, product("Widget", Decimal::new(1000, 2)))
            .await
            .unwrap();

        item.price = Decimal::new(1250, 2);
        let updated = gate.update(&ctx, item).await.unwrap();
        assert_eq!(updated.audit.modified_by.as_deref(), Some("u-1"));

        let trail = gate.audit_trail(&ctx, None, Pagination::default()).await.unwrap();
        assert_eq!(trail.len(), 2);
        let modified = &trail[0];
        assert_eq!(modified.action, AuditAction::Modified);
        let old = modified.old_values.as_ref().unwrap();
        let new = modified.new_values.as_ref().unwrap();
        assert_eq!(old.get("price"), Some(&serde_json::json!("10.00")));
        assert_eq!(new.get("price"), Some(&serde_json::json!("12.50")));
        assert!(!new.contains_key("modified_at"));
        assert!(!new.contains_key("modified_by"));
        assert_eq!(trail[1].action, AuditAction::Created);
    }

    #[tokio::test]
    async fn test_unaudited_entities_leave_no_trail() {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let ctx = ctx(TenantId::new());
        gate.insert(&ctx, Category::new("Tools".to_string(), None).unwrap())
            .await
            .unwrap();

        assert!(gate.audit_trail(&ctx, None, Pagination::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_rows_are_hard_deleted() {
        let store = Arc::new(InMemoryEntityStore::new());
        let gate = IsolationGate::new(store.clone());
        let ctx = ctx(TenantId::new());
        let user = gate
            .insert(&ctx, TenantUser::new("a@b.io".to_string(), "Ann".to_string(), TenantRole::Member).unwrap())
            .await
            .unwrap();
        let role = gate
            .insert(&ctx, Role::new("Clerk".to_string(), vec![]).unwrap())
            .await
            .unwrap();
        let link = gate.insert(&ctx, UserRole::new(user.id, role.id)).await.unwrap();

        gate.hard_delete_link::<UserRole>(&ctx, link.id).await.unwrap();

        assert!(store.load_row(EntityKind::UserRole, link.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_failure_fails_the_whole_save() {
        let mut store = MockEntityStore::new();
        store
            .expect_commit()
            .times(1)
            .returning(|_| Err(DomainError::DatabaseError("audit_logs insert failed".to_string())));
        let gate = IsolationGate::new(Arc::new(store));

        let err = gate
            .insert(&ctx(TenantId::new()), product("Widget", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_commit_batches_rows_with_their_audit_entries() {
        let mut store = MockEntityStore::new();
        store
            .expect_commit()
            .withf(|batch| batch.writes.len() == 2 && batch.audit_entries.len() == 1)
            .times(1)
            .returning(|_| Ok(()));
        let gate = IsolationGate::new(Arc::new(store));
        let ctx = ctx(TenantId::new());

        let mut uow = gate.unit_of_work(&ctx).unwrap();
        uow.add(product("Widget", Decimal::ONE)).unwrap();
        uow.add(Category::new("Tools".to_string(), None).unwrap()).unwrap();
        assert_eq!(uow.save().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_staged_guards_travel_with_the_batch() {
        let mut store = MockEntityStore::new();
        store
            .expect_commit()
            .withf(|batch| {
                matches!(
                    batch.guards.as_slice(),
                    [WriteGuard::RowLimit { max: 10, kind: EntityKind::Product, .. }]
                )
            })
            .times(1)
            .returning(|_| Ok(()));
        let gate = IsolationGate::new(Arc::new(store));
        let ctx = ctx(TenantId::new());

        let mut uow = gate.unit_of_work(&ctx).unwrap();
        uow.add(product("Widget", Decimal::ONE)).unwrap();
        uow.limit_rows::<Product>(ResourceKind::Product, Limit::Bounded(10));
        uow.limit_rows::<TenantUser>(ResourceKind::User, Limit::Unlimited);
        uow.save().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_scope_row_from_store_is_violation() {
        let mut store = MockEntityStore::new();
        let foreign = TenantId::new();
        store.expect_fetch().returning(move |_| {
            let item = Product::new("Leak".to_string(), None, Decimal::ONE).unwrap();
            Ok(vec![StoredRow {
                kind: EntityKind::Product,
                id: item.id,
                tenant_id: foreign,
                deleted: false,
                data: serde_json::to_value(&item).unwrap(),
            }])
        });
        let gate = IsolationGate::new(Arc::new(store));

        let err = gate
            .find(&ctx(TenantId::new()), Query::<Product>::new())
            .await
            .unwrap_err();
        assert!(err.is_isolation_violation());
    }

    #[tokio::test]
    async fn test_reads_require_established_context() {
        let gate = IsolationGate::new(Arc::new(InMemoryEntityStore::new()));
        let ctx = RequestContext::new(Actor::System, Default::default());

        assert!(matches!(
            gate.find(&ctx, Query::<Product>::new()).await,
            Err(DomainError::ContextNotEstablished)
        ));
    }
}
