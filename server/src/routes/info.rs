//! API info and label catalog endpoints

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crop_disease::ClassLabel;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub endpoints: BTreeMap<&'static str, &'static str>,
    pub status: String,
}

/// GET / and GET /api - Available endpoints
pub async fn api_info() -> Json<ApiInfo> {
    let endpoints = BTreeMap::from([
        ("health", "/health"),
        ("labels", "/api/labels"),
        ("detect", "/api/detect"),
        ("history", "/api/history"),
    ]);

    Json(ApiInfo {
        message: "Crop Disease Detection API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
        status: "running".to_string(),
    })
}

#[derive(Serialize)]
pub struct LabelsResponse {
    pub count: usize,
    pub labels: Vec<ClassLabel>,
}

/// GET /api/labels - The class labels in classifier output order
pub async fn list_labels(State(state): State<SharedState>) -> Json<LabelsResponse> {
    let labels = state.detector.catalog().labels().to_vec();
    Json(LabelsResponse {
        count: labels.len(),
        labels,
    })
}
