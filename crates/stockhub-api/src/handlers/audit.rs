//! Audit log reporting for the current tenant

use axum::{
    extract::{Query, State},
    Json,
};

use stockhub_core::domain::{AuditLogEntry, EntityKind};

use crate::dto::AuditLogParams;
use crate::error::ApiError;
use crate::extractors::CurrentTenant;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/audit-logs?entity_type=product&entity_id=...
pub async fn list(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<ApiResponse<Vec<AuditLogEntry>>>, ApiError> {
    let entity = match (params.entity_type.as_deref(), params.entity_id) {
        (Some(kind), Some(id)) => {
            let kind = EntityKind::from_str(kind)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown entity type: {}", kind)))?;
            Some((kind, id))
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "entity_type and entity_id must be given together".to_string(),
            ))
        }
    };

    let entries = state
        .gate
        .audit_trail(&ctx, entity, params.pagination())
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}
