// ============================================================================
// StockHub API - Rate Limit Middleware
// File: crates/stockhub-api/src/middleware/rate_limit.rs
// ============================================================================

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use stockhub_core::error::DomainError;
use stockhub_core::tenancy::{RateLimitStatus, RequestContext};
use stockhub_shared::constants::{
    is_exempt_path, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER,
};

use crate::error::{set_reset_header, ApiError};
use crate::state::AppState;

/// Admits the resolved tenant, counts the call and stamps the
/// `X-RateLimit-*` headers onto the response.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_exempt_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let ctx = request
        .extensions()
        .get::<Arc<RequestContext>>()
        .cloned()
        .ok_or(DomainError::ContextNotEstablished)?;
    let status = state.quota.admit_request(ctx.tenant_id()?).await?;

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &status);
    Ok(response)
}

fn apply_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER),
        HeaderValue::from(status.limit),
    );
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        HeaderValue::from(status.remaining),
    );
    set_reset_header(headers, status.reset_at.timestamp());
}
