//! Health check endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crop_disease::ClassifierStatus;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" while predictions come from the stand-in
    pub status: String,
    pub classifier: ClassifierStatus,
    pub uptime_seconds: u64,
    pub version: String,
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let classifier = state.detector.classifier_status().clone();
    let status = if classifier.degraded { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        classifier,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
