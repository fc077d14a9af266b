//! Domain errors

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Limit, ResourceKind, SubscriptionTier, TenantId};

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unable to resolve tenant context")]
    TenantUnresolved,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Tenant not active or subscription expired")]
    TenantNotActive,

    #[error("Subdomain already exists: {0}")]
    SubdomainAlreadyExists(String),

    #[error("Tier change rejected: can only upgrade from {current:?}, requested {requested:?}")]
    TierChangeRejected {
        current: SubscriptionTier,
        requested: SubscriptionTier,
    },

    #[error("Tenant context not established")]
    ContextNotEstablished,

    #[error("Tenant context already bound to {current}, refusing {attempted}")]
    ContextConflict { current: TenantId, attempted: TenantId },

    #[error("Isolation violation on {entity}: {detail}")]
    IsolationViolation { entity: String, detail: String },

    #[error("{0}")]
    QuotaExceeded(QuotaRejection),

    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: String, id: Uuid },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Audit recording failed: {0}")]
    AuditError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    pub fn isolation(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        DomainError::IsolationViolation {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: Uuid) -> Self {
        DomainError::EntityNotFound {
            entity: entity.into(),
            id,
        }
    }

    pub fn is_isolation_violation(&self) -> bool {
        matches!(self, DomainError::IsolationViolation { .. })
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::ValidationError(errors.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::InternalError(format!("serialization: {}", err))
    }
}

/// Details of a rejected quota check, enough for the caller to back off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaRejection {
    pub tenant_id: TenantId,
    pub resource: ResourceKind,
    pub current: u64,
    pub limit: Limit,
    /// When capacity frees up; only known for windowed resources.
    pub reset_at: Option<DateTime<Utc>>,
    pub retry_after_secs: Option<u64>,
}

impl std::fmt::Display for QuotaRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Quota exceeded for {}: {} of {}",
            self.resource.as_str(),
            self.current,
            self.limit
        )?;
        if let Some(secs) = self.retry_after_secs {
            write!(f, ", retry after {}s", secs)?;
        }
        Ok(())
    }
}
