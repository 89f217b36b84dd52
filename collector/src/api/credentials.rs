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
    services::credentials,
    types::{
        ApiKeyRequest, ApiKeyResponse, MessageResponse, RunCredentialsRequest,
        RunCredentialsResponse, SessionResponse,
    },
};

/// POST /api/run-credentials - Mint a short-lived session for a run
pub async fn run_credentials(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunCredentialsRequest>,
) -> Result<Json<RunCredentialsResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let session_id = execute_async(&db, move |conn| {
        let api_key = match req.api_key {
            Some(key) if !key.trim().is_empty() => Some(key),
            _ => credentials::stored_api_key(conn)?,
        };
        match api_key {
            Some(key) => Ok(Some(credentials::create_session(conn, &key)?)),
            None => Ok(None),
        }
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let Some(session_id) = session_id else {
        return Err((
            StatusCode::BAD_REQUEST,
            "No API key supplied and none stored".to_string(),
        ));
    };

    info!("Run session minted: session_id={}", session_id);

    Ok(Json(RunCredentialsResponse { session_id }))
}

/// GET /api/credentials/:id - Fetch a run session while it is still live
pub async fn get_credentials(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    let db = state.db.clone();
    let ttl = state.session_ttl;
    let id = session_id.clone();

    let session = execute_async(&db, move |conn| credentials::get_session(conn, &id, ttl))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    session.map(Json).ok_or((
        StatusCode::NOT_FOUND,
        format!("Session not found or expired: {}", session_id),
    ))
}

/// PUT /api/settings/api-key - Store the operator API key
pub async fn put_api_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiKeyRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    if req.api_key.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "apiKey must not be empty".to_string(),
        ));
    }

    let db = state.db.clone();

    execute_async(&db, move |conn| credentials::store_api_key(conn, &req.api_key))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!("API key updated");

    Ok(Json(MessageResponse {
        message: "API key stored".to_string(),
    }))
}

/// GET /api/settings/api-key - Read back the stored API key
pub async fn get_api_key(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiKeyResponse>, (StatusCode, String)> {
    let db = state.db.clone();

    let api_key = execute_async(&db, move |conn| credentials::stored_api_key(conn))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ApiKeyResponse { api_key }))
}
