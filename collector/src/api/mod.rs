pub mod agents;
pub mod credentials;
pub mod pcs;

use axum::{
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::types::HealthResponse;
use agents::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Agent protocol
        .route("/api/register-agent", post(agents::register_agent))
        .route("/api/heartbeat", post(agents::heartbeat))
        // Fleet management
        .route("/api/pcs", post(pcs::provision_pc))
        .route("/api/pcs", get(pcs::list_pcs))
        .route("/api/pcs/:id", delete(pcs::delete_pc))
        // Run credentials
        .route("/api/run-credentials", post(credentials::run_credentials))
        .route("/api/credentials/:id", get(credentials::get_credentials))
        .route("/api/settings/api-key", put(credentials::put_api_key))
        .route("/api/settings/api-key", get(credentials::get_api_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Health check endpoint
async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}
