//! Request extractors

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use stockhub_core::error::DomainError;
use stockhub_core::tenancy::RequestContext;

use crate::error::ApiError;

/// The per-request context installed by the tenant middleware.
///
/// Rejects with a server error when the middleware did not run, which only
/// happens for a route mounted outside the tenant layers.
pub struct CurrentTenant(pub Arc<RequestContext>);

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<RequestContext>>()
            .cloned()
            .map(CurrentTenant)
            .ok_or(ApiError::Domain(DomainError::ContextNotEstablished))
    }
}
