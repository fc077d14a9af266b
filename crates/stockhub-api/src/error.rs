// ============================================================================
// StockHub API - Error Mapping
// File: crates/stockhub-api/src/error.rs
// Description: DomainError -> HTTP status, error code and headers
// ============================================================================

use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use stockhub_core::domain::ResourceKind;
use stockhub_core::error::{DomainError, QuotaRejection};
use stockhub_shared::constants::{
    RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER, RATE_LIMIT_RESET_HEADER,
};

use crate::response::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => {
                warn!("Unauthorized: {}", msg);
                error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", &msg)
            }
            ApiError::BadRequest(msg) => {
                warn!("Bad request: {}", msg);
                error_response(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", &msg)
            }
            ApiError::Domain(err) => domain_response(err),
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ApiResponse::error(code, message))).into_response()
}

fn domain_response(err: DomainError) -> Response {
    let message = err.to_string();
    let (status, code) = match &err {
        DomainError::QuotaExceeded(rejection) if rejection.resource == ResourceKind::ApiCallPerMinute => {
            return rate_limited(rejection);
        }
        DomainError::QuotaExceeded(rejection) => {
            warn!(tenant_id = %rejection.tenant_id, "{}", message);
            let details = json!({
                "resource": rejection.resource,
                "current": rejection.current,
                "limit": rejection.limit,
            });
            return (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::error_with_details("QUOTA_EXCEEDED", &message, Some(details))),
            )
                .into_response();
        }
        DomainError::TenantUnresolved => (StatusCode::BAD_REQUEST, "TENANT_UNRESOLVED"),
        DomainError::TenantNotFound => (StatusCode::BAD_REQUEST, "TENANT_NOT_FOUND"),
        DomainError::TenantNotActive => (StatusCode::BAD_REQUEST, "TENANT_NOT_ACTIVE"),
        DomainError::IsolationViolation { .. } => (StatusCode::FORBIDDEN, "ISOLATION_VIOLATION"),
        DomainError::EntityNotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        DomainError::SubdomainAlreadyExists(_) => (StatusCode::CONFLICT, "SUBDOMAIN_EXISTS"),
        DomainError::TierChangeRejected { .. } => (StatusCode::CONFLICT, "TIER_CHANGE_REJECTED"),
        DomainError::ContextNotEstablished
        | DomainError::ContextConflict { .. }
        | DomainError::AuditError(_)
        | DomainError::DatabaseError(_)
        | DomainError::CacheError(_)
        | DomainError::InternalError(_) => {
            error!("Request failed: {}", message);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            );
        }
    };

    warn!(code, "{}", message);
    error_response(status, code, &message)
}

fn rate_limited(rejection: &QuotaRejection) -> Response {
    warn!(
        tenant_id = %rejection.tenant_id,
        current = rejection.current,
        "Rate limit exceeded"
    );

    let mut response = error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "RATE_LIMIT_EXCEEDED",
        "Rate limit exceeded",
    );
    let headers = response.headers_mut();
    headers.insert(
        RETRY_AFTER,
        HeaderValue::from(rejection.retry_after_secs.unwrap_or(1)),
    );
    if let Some(limit) = rejection.limit.as_option() {
        headers.insert(HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER), HeaderValue::from(limit));
    }
    headers.insert(HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER), HeaderValue::from(0u32));
    if let Some(reset_at) = rejection.reset_at {
        set_reset_header(headers, reset_at.timestamp());
    }
    response
}

pub(crate) fn set_reset_header(headers: &mut HeaderMap, reset_epoch_secs: i64) {
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_RESET_HEADER),
        HeaderValue::from(reset_epoch_secs),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stockhub_core::domain::{Limit, TenantId};

    fn rejection(resource: ResourceKind) -> QuotaRejection {
        QuotaRejection {
            tenant_id: TenantId::new(),
            resource,
            current: 61,
            limit: Limit::Bounded(60),
            reset_at: Some(Utc.with_ymd_and_hms(2030, 6, 1, 12, 31, 0).unwrap()),
            retry_after_secs: Some(45),
        }
    }

    #[test]
    fn test_rate_limit_maps_to_429_with_headers() {
        let err = ApiError::from(DomainError::QuotaExceeded(rejection(ResourceKind::ApiCallPerMinute)));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[RETRY_AFTER], "45");
        assert_eq!(headers[RATE_LIMIT_LIMIT_HEADER], "60");
        assert_eq!(headers[RATE_LIMIT_REMAINING_HEADER], "0");
        assert_eq!(
            headers[RATE_LIMIT_RESET_HEADER],
            Utc.with_ymd_and_hms(2030, 6, 1, 12, 31, 0).unwrap().timestamp().to_string().as_str()
        );
    }

    #[test]
    fn test_count_quota_maps_to_403() {
        let err = ApiError::from(DomainError::QuotaExceeded(rejection(ResourceKind::Product)));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DomainError::TenantUnresolved, StatusCode::BAD_REQUEST),
            (DomainError::TenantNotActive, StatusCode::BAD_REQUEST),
            (DomainError::isolation("Product", "foreign row"), StatusCode::FORBIDDEN),
            (DomainError::not_found("Product", uuid::Uuid::new_v4()), StatusCode::NOT_FOUND),
            (DomainError::SubdomainAlreadyExists("acme".into()), StatusCode::CONFLICT),
            (DomainError::DatabaseError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
