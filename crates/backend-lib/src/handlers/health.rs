// ============================
// crates/backend-lib/src/handlers/health.rs
// ============================
use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use livepad_common::HealthResponse;

use crate::AppState;

/// `GET /health`: resident sessions, attached connections and store status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registry = state.registry();
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        active_session_count: registry.len(),
        total_connection_count: registry.connection_count(),
        storage_status: state.gateway().status(),
    })
}
