use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use super::AppState;
use super::types::{ApiResponse, HealthData, SystemInfo};

/// GET /v1/healthcheck
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthData {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment: state.config().server.env.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    }))
}
