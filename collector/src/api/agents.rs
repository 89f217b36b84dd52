use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    db::{execute_async, DbPool},
    services::pc_registry,
    types::{HeartbeatRequest, MessageResponse, RegisterRequest},
};

pub struct AppState {
    pub db: DbPool,
    pub session_ttl: Duration,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// POST /api/register-agent - Agent announces itself and goes ONLINE
pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let Some(token) = bearer_token(&headers) else {
        return Err((StatusCode::UNAUTHORIZED, "Missing bearer token".to_string()));
    };

    // The body repeats the token; a mismatch means the caller is confused
    // about its own identity and is rejected outright.
    if req.auth_token != token {
        warn!("Registration token mismatch for pc_id={}", req.pc_id);
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    let db = state.db.clone();
    let pc_id = req.pc_id.clone();

    let authorized = execute_async(&db, move |conn| {
        if !pc_registry::verify_token(conn, &req.pc_id, &token)? {
            return Ok(false);
        }
        pc_registry::record_registration(conn, &req)?;
        Ok(true)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if !authorized {
        warn!("Rejected registration for pc_id={}", pc_id);
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    info!("Agent registered: pc_id={}", pc_id);

    Ok(Json(MessageResponse {
        message: format!("Agent {} registered", pc_id),
    }))
}

/// POST /api/heartbeat - Periodic ONLINE report or terminal OFFLINE notice
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let Some(token) = bearer_token(&headers) else {
        return Err((StatusCode::UNAUTHORIZED, "Missing bearer token".to_string()));
    };

    let db = state.db.clone();
    let pc_id = req.pc_id.clone();
    let status = req.status;

    let authorized = execute_async(&db, move |conn| {
        if !pc_registry::verify_token(conn, &req.pc_id, &token)? {
            return Ok(false);
        }
        pc_registry::record_heartbeat(conn, &req)?;
        Ok(true)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if !authorized {
        warn!("Rejected heartbeat for pc_id={}", pc_id);
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    Ok(Json(MessageResponse {
        message: format!("Heartbeat accepted ({})", status.as_str()),
    }))
}
