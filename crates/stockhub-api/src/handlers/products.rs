//! Product endpoints. Every call goes through the isolation gate via
//! [`InventoryService`](stockhub_core::services::InventoryService).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use stockhub_core::domain::Product;
use stockhub_core::services::ProductChanges;

use crate::dto::{CreateProductRequest, ListParams};
use crate::error::ApiError;
use crate::extractors::CurrentTenant;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let products = state
        .inventory
        .list_products(&ctx, params.search.as_deref(), params.pagination())
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    payload.validate()?;

    let mut product = Product::new(payload.name, payload.sku, payload.price)?;
    product.description = payload.description;
    product.reorder_level = payload.reorder_level;

    let product = state.inventory.create_product(&ctx, product).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

/// PUT /api/products/{id}
pub async fn update(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Path(id): Path<Uuid>,
    Json(changes): Json<ProductChanges>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = state.inventory.update_product(&ctx, id, changes).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// DELETE /api/products/{id}
pub async fn delete(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.inventory.delete_product(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
