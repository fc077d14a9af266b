//! Tenant-scoped entity storage trait (port)
//!
//! Entities are persisted as JSON documents keyed by `(kind, id)`, with the
//! owning tenant and the deletion flag lifted out so that stores can filter
//! on them without parsing the document.

use async_trait::async_trait;
use serde_json::Value;

use stockhub_shared::{EntityId, Pagination};

use crate::domain::{AuditLogEntry, EntityKind, Limit, ResourceKind, TenantId};
use crate::error::{DomainError, QuotaRejection};
use crate::tenancy::ScopedQuery;

/// One persisted entity as the store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub kind: EntityKind,
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub deleted: bool,
    pub data: Value,
}

/// A single row mutation inside a [`ChangeBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowWrite {
    Insert(StoredRow),
    /// Full replacement of an existing row, including soft deletes.
    Update(StoredRow),
    /// Physical removal. Only ever produced for link records.
    Delete {
        kind: EntityKind,
        id: EntityId,
        tenant_id: TenantId,
    },
}

impl RowWrite {
    pub fn kind(&self) -> EntityKind {
        match self {
            RowWrite::Insert(row) | RowWrite::Update(row) => row.kind,
            RowWrite::Delete { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            RowWrite::Insert(row) | RowWrite::Update(row) => row.id,
            RowWrite::Delete { id, .. } => *id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            RowWrite::Insert(row) | RowWrite::Update(row) => row.tenant_id,
            RowWrite::Delete { tenant_id, .. } => *tenant_id,
        }
    }
}

/// A condition the store re-checks inside the commit, after the batch's
/// writes are applied and while `(tenant_id, kind)` is locked. A failing
/// guard aborts the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteGuard {
    /// Live rows of `kind` owned by the tenant must not exceed `max`.
    RowLimit {
        tenant_id: TenantId,
        kind: EntityKind,
        resource: ResourceKind,
        max: u64,
    },
    /// At most one live row of `kind` owned by the tenant may hold `value`
    /// in `field`.
    Unique {
        tenant_id: TenantId,
        kind: EntityKind,
        field: String,
        value: Value,
    },
}

impl WriteGuard {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            WriteGuard::RowLimit { tenant_id, .. } | WriteGuard::Unique { tenant_id, .. } => *tenant_id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            WriteGuard::RowLimit { kind, .. } | WriteGuard::Unique { kind, .. } => *kind,
        }
    }

    /// Largest number of matching live rows that still passes.
    pub fn threshold(&self) -> u64 {
        match self {
            WriteGuard::RowLimit { max, .. } => *max,
            WriteGuard::Unique { .. } => 1,
        }
    }

    /// Whether a live row counts towards this guard.
    pub fn matches(&self, row: &StoredRow) -> bool {
        if row.deleted || row.tenant_id != self.tenant_id() || row.kind != self.kind() {
            return false;
        }
        match self {
            WriteGuard::RowLimit { .. } => true,
            WriteGuard::Unique { field, value, .. } => row.data.get(field) == Some(value),
        }
    }

    /// Error for a commit that observed `matching` rows after its writes.
    pub fn rejection(&self, matching: u64) -> DomainError {
        match self {
            WriteGuard::RowLimit {
                tenant_id,
                resource,
                max,
                ..
            } => DomainError::QuotaExceeded(QuotaRejection {
                tenant_id: *tenant_id,
                resource: *resource,
                current: matching.saturating_sub(1),
                limit: Limit::Bounded(*max),
                reset_at: None,
                retry_after_secs: None,
            }),
            WriteGuard::Unique { kind, field, value, .. } => DomainError::ValidationError(format!(
                "{} already exists: {} = {}",
                kind.type_name(),
                field,
                value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())
            )),
        }
    }
}

/// Row writes and their audit entries, committed all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub writes: Vec<RowWrite>,
    pub audit_entries: Vec<AuditLogEntry>,
    pub guards: Vec<WriteGuard>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.audit_entries.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn fetch(&self, query: &ScopedQuery) -> Result<Vec<StoredRow>, DomainError>;
    async fn count(&self, query: &ScopedQuery) -> Result<u64, DomainError>;
    /// Raw primary-key lookup with no tenant filter. Used by the gate to
    /// tell "not yours" apart from "does not exist" on writes.
    async fn load_row(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredRow>, DomainError>;
    async fn commit(&self, batch: ChangeBatch) -> Result<(), DomainError>;
    /// Newest first.
    async fn audit_entries(
        &self,
        tenant_id: TenantId,
        entity: Option<(EntityKind, EntityId)>,
        page: Pagination,
    ) -> Result<Vec<AuditLogEntry>, DomainError>;
}
