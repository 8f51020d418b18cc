use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::routes::{AppState, RuntimeSummary};

#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub components: RuntimeSummary,
    pub checked_at: String,
}

/// Liveness plus a summary of which optional components are configured.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "dealscope-server",
        components: state.runtime_summary.clone(),
        checked_at: Utc::now().to_rfc3339(),
    })
}
