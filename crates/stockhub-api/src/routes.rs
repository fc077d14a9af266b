// ============================================================================
// StockHub API - Router
// File: crates/stockhub-api/src/routes.rs
// ============================================================================

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handlers::{audit, auth, health, products, tenants};
use crate::middleware::{rate_limit, tenant_context};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Exempt: no tenant, no rate limit
        .route("/health", get(health::health_check))
        .route("/api/auth/signup", post(auth::signup))
        // Tenant subscription
        .route("/api/tenant/usage", get(tenants::usage))
        .route("/api/tenant/upgrade", post(tenants::upgrade))
        .route("/api/tenant/extend", post(tenants::extend))
        // Products
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/{id}", put(products::update).delete(products::delete))
        // Reporting
        .route("/api/audit-logs", get(audit::list))
        // Last added runs first: tenant_context, then rate_limit.
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), tenant_context))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
