//! HTTP routes

pub mod detect;
pub mod health;
pub mod history;
pub mod info;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Header carrying the caller's identity, set by the fronting auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity, if present and non-empty
pub fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn router(state: SharedState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    // Every API path is also served with a trailing slash, the form web clients call
    Router::new()
        .route("/", get(info::api_info))
        .route("/health", get(health::health_check))
        .route("/api", get(info::api_info))
        .route("/api/", get(info::api_info))
        .route("/api/labels", get(info::list_labels))
        .route("/api/labels/", get(info::list_labels))
        .route("/api/detect", post(detect::detect_disease))
        .route("/api/detect/", post(detect::detect_disease))
        .route("/api/history", get(history::detection_history))
        .route("/api/history/", get(history::detection_history))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
