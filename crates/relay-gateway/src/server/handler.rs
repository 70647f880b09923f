//! Health handlers

use crate::registry::StatusCounts;
use crate::server::GatewayState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Liveness probe
pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub sessions: StatusCounts,
}

/// Readiness probe with per-status session counts
pub async fn readiness(State(state): State<GatewayState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ready",
        sessions: state.registry().status_counts(),
    })
}
