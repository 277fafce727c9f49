//! Detection history endpoint

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::history::{ActivityEntry, DetectionRecord, UserStatistics};
use crate::routes::user_id;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct HistoryResponse {
    /// Newest first
    pub history: Vec<DetectionRecord>,
    pub statistics: UserStatistics,
    pub activity_timeline: Vec<ActivityEntry>,
}

/// GET /api/history - The caller's detections and statistics
pub async fn detection_history(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<HistoryResponse>> {
    let user = user_id(&headers).ok_or(ApiError::Unauthorized)?;

    Ok(Json(HistoryResponse {
        history: state.history.history(&user).await,
        statistics: state.history.statistics(&user).await,
        activity_timeline: state.history.timeline(&user).await,
    }))
}
