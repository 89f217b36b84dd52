use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    api::agents::AppState,
    db::execute_async,
    services::pc_registry,
    types::{ListPcsResponse, MessageResponse, ProvisionPcRequest, ProvisionPcResponse},
};

/// POST /api/pcs - Provision a machine and mint its auth token
pub async fn provision_pc(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProvisionPcRequest>,
) -> Result<Json<ProvisionPcResponse>, (StatusCode, String)> {
    if req.pc_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "pcId must not be empty".to_string()));
    }

    let db = state.db.clone();
    let pc_id = req.pc_id.clone();

    let token = execute_async(&db, move |conn| {
        if pc_registry::pc_exists(conn, &req.pc_id)? {
            return Ok(None);
        }
        let token = pc_registry::provision_pc(
            conn,
            &req.pc_id,
            req.owner.as_deref(),
            req.location.as_deref(),
            req.pc_type.as_deref(),
        )?;
        Ok(Some(token))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let Some(auth_token) = token else {
        return Err((
            StatusCode::CONFLICT,
            format!("PC already provisioned: {}", pc_id),
        ));
    };

    info!("PC provisioned: pc_id={}", pc_id);

    Ok(Json(ProvisionPcResponse { pc_id, auth_token }))
}

/// GET /api/pcs - List all PC records
pub async fn list_pcs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListPcsResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let pcs = execute_async(&db, move |conn| pc_registry::list_pcs(conn))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ListPcsResponse { pcs }))
}

/// DELETE /api/pcs/:id - Deregister a machine
pub async fn delete_pc(
    State(state): State<Arc<AppState>>,
    Path(pc_id): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let id = pc_id.clone();

    let deleted = execute_async(&db, move |conn| pc_registry::delete_pc(conn, &id))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if !deleted {
        return Err((StatusCode::NOT_FOUND, format!("PC not found: {}", pc_id)));
    }

    info!("PC deleted: pc_id={}", pc_id);

    Ok(Json(MessageResponse {
        message: format!("PC {} removed", pc_id),
    }))
}
