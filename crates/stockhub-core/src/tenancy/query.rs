//! Query construction for tenant-scoped reads
//!
//! Callers build a [`Query`] with their own predicates. Only the isolation
//! gate can turn it into a [`ScopedQuery`], which is the sole input the
//! [`EntityStore`](crate::repositories::EntityStore) accepts for reads. The
//! baseline `tenant == current && !deleted` is part of every scoped query.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use stockhub_shared::Pagination;

use crate::domain::{EntityKind, TenantId, TenantScoped};
use crate::error::DomainError;
use crate::repositories::StoredRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    /// Case-insensitive substring match on string fields.
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn matches(&self, row: &Value) -> bool {
        let actual = row.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Ne => actual != &self.value,
            FilterOp::Contains => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// Caller-side predicates for one entity type.
#[derive(Debug, Clone)]
pub struct Query<T> {
    filters: Vec<FieldFilter>,
    order: Option<SortOrder>,
    page: Option<Pagination>,
    /// First construction error; reported when the query is bound.
    problem: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TenantScoped> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TenantScoped> Query<T> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: None,
            page: None,
            problem: None,
            _marker: PhantomData,
        }
    }

    pub fn eq(self, field: &str, value: impl Serialize) -> Self {
        self.push(field, FilterOp::Eq, value)
    }

    pub fn ne(self, field: &str, value: impl Serialize) -> Self {
        self.push(field, FilterOp::Ne, value)
    }

    pub fn contains(self, field: &str, text: &str) -> Self {
        self.push(field, FilterOp::Contains, text)
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        if self.check_field(field) {
            self.order = Some(SortOrder {
                field: field.to_string(),
                direction,
            });
        }
        self
    }

    pub fn paginate(mut self, page: Pagination) -> Self {
        self.page = Some(page);
        self
    }

    fn push(mut self, field: &str, op: FilterOp, value: impl Serialize) -> Self {
        if !self.check_field(field) {
            return self;
        }
        match serde_json::to_value(value) {
            Ok(value) => self.filters.push(FieldFilter {
                field: field.to_string(),
                op,
                value,
            }),
            Err(e) => self.record_problem(format!("unserializable value for {}: {}", field, e)),
        }
        self
    }

    fn record_problem(&mut self, problem: String) {
        if self.problem.is_none() {
            self.problem = Some(problem);
        }
    }

    /// Field names end up in SQL as bound JSON keys; keep them plain.
    fn check_field(&mut self, field: &str) -> bool {
        let valid = !field.is_empty()
            && field.len() <= 64
            && field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            self.record_problem(format!("invalid query field: {}", field));
        }
        valid
    }
}

/// A query bound to one tenant. Constructible only inside this crate.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    kind: EntityKind,
    tenant_id: TenantId,
    filters: Vec<FieldFilter>,
    order: Option<SortOrder>,
    page: Option<Pagination>,
}

impl ScopedQuery {
    pub(crate) fn bind<T: TenantScoped>(tenant_id: TenantId, query: Query<T>) -> Result<Self, DomainError> {
        if let Some(problem) = query.problem {
            return Err(DomainError::ValidationError(problem));
        }
        Ok(Self {
            kind: T::KIND,
            tenant_id,
            filters: query.filters,
            order: query.order,
            page: query.page,
        })
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn order(&self) -> Option<&SortOrder> {
        self.order.as_ref()
    }

    pub fn page(&self) -> Option<Pagination> {
        self.page
    }

    /// Baseline plus caller predicates, for stores that filter in memory.
    pub fn matches(&self, row: &StoredRow) -> bool {
        row.kind == self.kind
            && row.tenant_id == self.tenant_id
            && !row.deleted
            && self.filters.iter().all(|f| f.matches(&row.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;
    use serde_json::json;

    fn row(tenant_id: TenantId, deleted: bool, data: Value) -> StoredRow {
        StoredRow {
            kind: EntityKind::Product,
            id: uuid::Uuid::new_v4(),
            tenant_id,
            deleted,
            data,
        }
    }

    #[test]
    fn test_baseline_applies_regardless_of_predicates() {
        let mine = TenantId::new();
        let theirs = TenantId::new();
        let query = ScopedQuery::bind(mine, Query::<Product>::new().eq("name", "Widget")).unwrap();

        assert!(query.matches(&row(mine, false, json!({"name": "Widget"}))));
        assert!(!query.matches(&row(theirs, false, json!({"name": "Widget"}))));
        assert!(!query.matches(&row(mine, true, json!({"name": "Widget"}))));
        assert!(!query.matches(&row(mine, false, json!({"name": "Gadget"}))));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let filter = FieldFilter {
            field: "name".to_string(),
            op: FilterOp::Contains,
            value: json!("WID"),
        };
        assert!(filter.matches(&json!({"name": "Blue widget"})));
        assert!(!filter.matches(&json!({"name": 42})));
    }

    #[test]
    fn test_invalid_field_is_rejected() {
        let query = Query::<Product>::new().eq("name'; DROP TABLE", 1);
        assert!(ScopedQuery::bind(TenantId::new(), query).is_err());
    }

    #[test]
    fn test_unserializable_value_is_rejected_not_nulled() {
        // JSON object keys must be strings.
        let mut value = std::collections::BTreeMap::new();
        value.insert(vec![1u8], 1u8);
        let query = Query::<Product>::new().eq("name", value);

        match ScopedQuery::bind(TenantId::new(), query) {
            Err(DomainError::ValidationError(message)) => assert!(message.contains("name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
