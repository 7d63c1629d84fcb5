use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use aptwatch_types::readiness;

use crate::handlers::ApiState;
use crate::handlers::*;
use crate::types::HealthResponse;

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(render_metrics))
        .route("/stats", get(get_stats))
        .route("/v1/observation-requests", post(submit_observation_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Liveness of the admin server; reports sync state without failing.
async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let ready = state.readiness.is_ready(readiness::APTOS_SYNCING);

    Json(HealthResponse {
        status: if ready { "healthy" } else { "syncing" }.to_string(),
        chain_id: state.chain_id,
        ready,
        timestamp: unix_now(),
    })
}

/// Readiness check endpoint (for Kubernetes/Docker health checks)
async fn readiness_check(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    use serde_json::json;

    if state.readiness.is_ready(readiness::APTOS_SYNCING) {
        Ok(Json(json!({
            "status": "ready",
            "timestamp": unix_now()
        })))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
