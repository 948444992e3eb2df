//! Health check handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::ApiState;

/// Service health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub charge_points: usize,
    pub connected_charge_points: usize,
}

pub async fn health_check(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        charge_points: state.central.charge_point_ids().len(),
        connected_charge_points: state.central.sessions().count(),
    }))
}
