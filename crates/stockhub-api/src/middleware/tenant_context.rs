// ============================================================================
// StockHub API - Tenant Context Middleware
// File: crates/stockhub-api/src/middleware/tenant_context.rs
// ============================================================================
//! Resolves the tenant for every non-exempt request and installs the
//! request's [`RequestContext`] into the extensions.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, warn};

use stockhub_core::error::DomainError;
use stockhub_core::tenancy::{
    Actor, CredentialClaims, RequestContext, RequestMetadata, ResolutionRequest,
};
use stockhub_security::JwtService;
use stockhub_shared::constants::{is_exempt_path, TENANT_HEADER};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn tenant_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_exempt_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let claims = bearer_claims(&state.jwt, headers)?;
    let actor = Actor::from_claim(claims.as_ref().and_then(|c| c.subject.as_deref()));
    let resolution = ResolutionRequest {
        host: request_host(&request),
        claims,
        tenant_header: header_str(headers, TENANT_HEADER),
    };
    let metadata = RequestMetadata {
        ip_address: client_ip(&request),
        user_agent: header_str(headers, header::USER_AGENT.as_str()),
    };

    let resolved = state
        .resolver
        .resolve(&resolution, Utc::now())
        .await?
        .ok_or_else(|| {
            warn!(host = ?resolution.host, path = %request.uri().path(), "Request rejected: tenant unresolved");
            DomainError::TenantUnresolved
        })?;

    let ctx = RequestContext::new(actor, metadata);
    ctx.tenant().set(resolved.tenant_id)?;
    debug!(
        tenant_id = %resolved.tenant_id,
        source = resolved.source.as_str(),
        "Tenant context established"
    );

    request.extensions_mut().insert(Arc::new(ctx));
    Ok(next.run(request).await)
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `Host` header, falling back to the URI authority (HTTP/2).
fn request_host(request: &Request) -> Option<String> {
    header_str(request.headers(), header::HOST.as_str())
        .or_else(|| request.uri().host().map(str::to_string))
}

/// Claims of a bearer token. No token means no claims; a token that fails
/// validation rejects the request.
fn bearer_claims(jwt: &JwtService, headers: &HeaderMap) -> Result<Option<CredentialClaims>, ApiError> {
    let Some(value) = header_str(headers, header::AUTHORIZATION.as_str()) else {
        return Ok(None);
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Ok(None);
    };

    let claims = jwt
        .validate_token(token.trim())
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    Ok(Some(CredentialClaims {
        tenant_id: claims.tenant_id,
        subject: Some(claims.sub),
    }))
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_ip(request: &Request) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}
