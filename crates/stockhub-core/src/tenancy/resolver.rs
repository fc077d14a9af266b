//! Tenant resolution strategy chain
//!
//! Subdomain, then credential claim, then explicit header. The first
//! strategy that yields a tenant wins; results are never merged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use stockhub_shared::utils::{extract_subdomain, parse_identity};

use crate::domain::TenantId;
use crate::error::DomainError;
use crate::repositories::TenantRepository;

/// Claims lifted from a validated bearer credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialClaims {
    pub tenant_id: Option<String>,
    pub subject: Option<String>,
}

/// The parts of an inbound request the resolver looks at.
#[derive(Debug, Clone, Default)]
pub struct ResolutionRequest {
    pub host: Option<String>,
    /// Present only when the caller is authenticated.
    pub claims: Option<CredentialClaims>,
    pub tenant_header: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Subdomain,
    Claim,
    Header,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Subdomain => "subdomain",
            ResolutionSource::Claim => "claim",
            ResolutionSource::Header => "header",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTenant {
    pub tenant_id: TenantId,
    pub source: ResolutionSource,
}

pub struct TenantResolver {
    tenants: Arc<dyn TenantRepository>,
}

impl TenantResolver {
    pub fn new(tenants: Arc<dyn TenantRepository>) -> Self {
        Self { tenants }
    }

    /// `Ok(None)` means unresolved. Registry failures are returned as errors.
    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedTenant>, DomainError> {
        if let Some(tenant_id) = self.from_subdomain(request.host.as_deref(), now).await? {
            return Ok(Some(Self::resolved(tenant_id, ResolutionSource::Subdomain)));
        }

        // The credential was validated upstream; its claim is trusted as is.
        let claimed = request
            .claims
            .as_ref()
            .and_then(|claims| claims.tenant_id.as_deref())
            .and_then(parse_identity)
            .and_then(TenantId::from_uuid);
        if let Some(tenant_id) = claimed {
            return Ok(Some(Self::resolved(tenant_id, ResolutionSource::Claim)));
        }

        let from_header = request
            .tenant_header
            .as_deref()
            .and_then(parse_identity)
            .and_then(TenantId::from_uuid);
        if let Some(tenant_id) = from_header {
            return Ok(Some(Self::resolved(tenant_id, ResolutionSource::Header)));
        }

        debug!(host = ?request.host, "Tenant unresolved");
        Ok(None)
    }

    async fn from_subdomain(
        &self,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<TenantId>, DomainError> {
        let Some(subdomain) = host.and_then(extract_subdomain) else {
            return Ok(None);
        };

        match self.tenants.find_by_subdomain(&subdomain).await? {
            Some(tenant) if tenant.is_subscription_active_at(now) => Ok(Some(tenant.id)),
            Some(tenant) => {
                debug!(
                    tenant_id = %tenant.id,
                    subdomain = %subdomain,
                    "Subdomain tenant inactive or expired, falling through"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn resolved(tenant_id: TenantId, source: ResolutionSource) -> ResolvedTenant {
        debug!(tenant_id = %tenant_id, source = source.as_str(), "Tenant resolved");
        ResolvedTenant { tenant_id, source }
    }
}
