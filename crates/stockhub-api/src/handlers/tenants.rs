//! Current-tenant subscription endpoints

use axum::{extract::State, Json};
use validator::Validate;

use stockhub_core::domain::UsageSnapshot;

use crate::dto::{ExtendSubscriptionRequest, TenantDto, UpgradeTierRequest};
use crate::error::ApiError;
use crate::extractors::CurrentTenant;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/tenant/usage
pub async fn usage(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
) -> Result<Json<ApiResponse<UsageSnapshot>>, ApiError> {
    let snapshot = state.subscriptions.usage(ctx.tenant_id()?).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// POST /api/tenant/upgrade
pub async fn upgrade(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Json(payload): Json<UpgradeTierRequest>,
) -> Result<Json<ApiResponse<TenantDto>>, ApiError> {
    let tenant = state
        .subscriptions
        .upgrade_tier(ctx.tenant_id()?, payload.tier, ctx.actor())
        .await?;
    Ok(Json(ApiResponse::success(tenant.into())))
}

/// POST /api/tenant/extend
pub async fn extend(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Json(payload): Json<ExtendSubscriptionRequest>,
) -> Result<Json<ApiResponse<TenantDto>>, ApiError> {
    payload.validate()?;
    let tenant = state
        .subscriptions
        .extend_subscription(ctx.tenant_id()?, payload.months, ctx.actor())
        .await?;
    Ok(Json(ApiResponse::success(tenant.into())))
}
