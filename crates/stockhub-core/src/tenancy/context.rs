//! Request-scoped tenant context
//!
//! Established once at the request boundary and passed explicitly into
//! every data-access call.

use std::fmt;
use std::net::IpAddr;

use parking_lot::Mutex;
use tracing::{debug, error};

use stockhub_shared::constants::SYSTEM_ACTOR;

use crate::domain::TenantId;
use crate::error::DomainError;

#[derive(Debug, Default)]
struct ContextState {
    tenant: Option<TenantId>,
    observed: bool,
}

/// Single-write-then-many-read cell holding the resolved tenant.
///
/// `get` before `set` fails; it never yields a default identity. Re-binding
/// to a different tenant after the value has been read fails loudly.
#[derive(Debug, Default)]
pub struct TenantContext {
    state: Mutex<ContextState>,
}

impl TenantContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        let mut state = self.state.lock();
        match state.tenant {
            None => {
                state.tenant = Some(tenant_id);
                Ok(())
            }
            Some(current) if current == tenant_id => Ok(()),
            Some(current) if !state.observed => {
                debug!(%current, replacement = %tenant_id, "Tenant context rebound before first read");
                state.tenant = Some(tenant_id);
                Ok(())
            }
            Some(current) => {
                error!(
                    %current,
                    attempted = %tenant_id,
                    "Attempt to rebind tenant context after it was read"
                );
                Err(DomainError::ContextConflict {
                    current,
                    attempted: tenant_id,
                })
            }
        }
    }

    pub fn get(&self) -> Result<TenantId, DomainError> {
        let mut state = self.state.lock();
        let tenant = state.tenant.ok_or(DomainError::ContextNotEstablished)?;
        state.observed = true;
        Ok(tenant)
    }

    pub fn is_established(&self) -> bool {
        self.state.lock().tenant.is_some()
    }
}

/// Who performs a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(String),
    System,
}

impl Actor {
    /// Blank ids fall back to [`Actor::System`].
    pub fn from_claim(sub: Option<&str>) -> Self {
        match sub.map(str::trim) {
            Some(id) if !id.is_empty() => Actor::User(id.to_string()),
            _ => Actor::System,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User(id) => f.write_str(id),
            Actor::System => f.write_str(SYSTEM_ACTOR),
        }
    }
}

/// Caller metadata copied into audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Everything a data operation needs to know about the current request.
#[derive(Debug)]
pub struct RequestContext {
    tenant: TenantContext,
    actor: Actor,
    metadata: RequestMetadata,
}

impl RequestContext {
    pub fn new(actor: Actor, metadata: RequestMetadata) -> Self {
        Self {
            tenant: TenantContext::new(),
            actor,
            metadata,
        }
    }

    /// Context already bound to `tenant_id`, for background jobs and tests.
    pub fn for_tenant(tenant_id: TenantId, actor: Actor) -> Self {
        Self {
            tenant: TenantContext {
                state: Mutex::new(ContextState {
                    tenant: Some(tenant_id),
                    observed: false,
                }),
            },
            actor,
            metadata: RequestMetadata::default(),
        }
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn tenant_id(&self) -> Result<TenantId, DomainError> {
        self.tenant.get()
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_before_set_fails() {
        let ctx = TenantContext::new();
        assert!(matches!(ctx.get(), Err(DomainError::ContextNotEstablished)));
        assert!(!ctx.is_established());
    }

    #[test]
    fn test_set_is_idempotent_for_same_value() {
        let ctx = TenantContext::new();
        let tenant = TenantId::new();
        ctx.set(tenant).unwrap();
        assert_eq!(ctx.get().unwrap(), tenant);
        ctx.set(tenant).unwrap();
        assert_eq!(ctx.get().unwrap(), tenant);
    }

    #[test]
    fn test_rebind_after_read_fails_loudly() {
        let ctx = TenantContext::new();
        let first = TenantId::new();
        let second = TenantId::new();
        ctx.set(first).unwrap();
        ctx.get().unwrap();

        let err = ctx.set(second).unwrap_err();
        assert!(matches!(err, DomainError::ContextConflict { current, attempted } if current == first && attempted == second));
        assert_eq!(ctx.get().unwrap(), first);
    }

    #[test]
    fn test_rebind_before_read_is_allowed() {
        let ctx = TenantContext::new();
        let second = TenantId::new();
        ctx.set(TenantId::new()).unwrap();
        ctx.set(second).unwrap();
        assert_eq!(ctx.get().unwrap(), second);
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(Actor::from_claim(Some("u-42")).to_string(), "u-42");
        assert_eq!(Actor::from_claim(Some("  ")).to_string(), "System");
        assert_eq!(Actor::from_claim(None), Actor::System);
    }
}
