// ============================================================================
// StockHub API - Signup Handler
// File: crates/stockhub-api/src/handlers/auth.rs
// ============================================================================
//! Tenant signup. Runs without a resolved tenant: the tenant is created here.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;
use validator::Validate;

use stockhub_core::domain::{TenantRole, TenantUser};
use stockhub_core::error::DomainError;
use stockhub_core::services::NewTenant;
use stockhub_shared::utils::mask_email;

use crate::dto::{SignupRequest, SignupResponse, TenantDto};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Signup handler - POST /api/auth/signup
///
/// Creates the tenant, its first admin user inside the new tenant, and an
/// access token carrying both identities.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SignupResponse>>), ApiError> {
    payload.validate()?;
    info!("Signup request for {}", mask_email(&payload.admin_email));

    // Built first so a bad admin fails before anything is stored.
    let owner = TenantUser::new(payload.admin_email.clone(), payload.admin_name, TenantRole::Owner)?;

    let (tenant, admin) = state
        .subscriptions
        .signup(
            NewTenant {
                name: payload.company_name,
                subdomain: payload.subdomain,
                admin_email: payload.admin_email,
                tier: payload.tier,
            },
            owner,
        )
        .await?;

    let access_token = state
        .jwt
        .generate_access_token(&admin.id, Some(tenant.id.as_uuid()))
        .map_err(|e| DomainError::InternalError(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SignupResponse {
            tenant: TenantDto::from(tenant),
            admin_user_id: admin.id,
            access_token,
        })),
    ))
}
