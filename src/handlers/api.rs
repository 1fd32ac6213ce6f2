use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_sessions: usize,
    pub model: String,
    pub sample_rate: u32,
}

/// Liveness probe with a snapshot of current load
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        active_sessions: state.active_sessions(),
        model: state.server_info.model.clone(),
        sample_rate: state.server_info.sample_rate,
    })
}
