//! Detection endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};

use crop_disease::PredictionResult;

use crate::error::{ApiError, ApiResult};
use crate::routes::user_id;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    /// Base64 image, optionally as a `data:image/...;base64,` URL
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Detection {
    #[serde(flatten)]
    pub result: PredictionResult,
    /// Set when the detection was recorded to the caller's history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub message: String,
    pub detection: Detection,
    /// True while predictions come from the stand-in classifier
    pub degraded: bool,
}

/// POST /api/detect - Detect the disease in a base64 image
pub async fn detect_disease(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let Json(request) = payload?;

    let image = request
        .image
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Image data is required"))?;

    let bytes = decode_image_payload(&image).map_err(|e| {
        warn!(error = %e, "Rejecting image payload");
        ApiError::bad_request("Invalid image format")
    })?;

    let result = run_detection(&state, bytes).await;

    let mut detection = Detection {
        result,
        id: None,
        timestamp: None,
    };

    if let Some(user) = user_id(&headers) {
        if !detection.result.is_failure() {
            let record = state.history.record(&user, &detection.result).await;
            detection.id = Some(record.id);
            detection.timestamp = Some(record.timestamp);
        }
    }

    info!(
        crop = %detection.result.crop,
        disease = %detection.result.disease,
        confidence = detection.result.confidence,
        "Disease detection completed"
    );

    Ok(Json(DetectResponse {
        message: "Disease detection completed".to_string(),
        detection,
        degraded: state.detector.is_degraded(),
    }))
}

/// Run the detector off the async runtime, bounded by the configured deadline.
///
/// At most `max_concurrent_detections` run at once. The permit moves into the
/// blocking task, so a detection abandoned at the deadline keeps its slot
/// until the work finishes.
async fn run_detection(state: &SharedState, bytes: Vec<u8>) -> PredictionResult {
    let service = state.detector.clone();
    let permits = state.detect_permits.clone();
    let deadline = state.config.detect_timeout();

    let work = async move {
        let permit = permits
            .acquire_owned()
            .await
            .map_err(|e| e.to_string())?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            service.detect(&bytes)
        })
        .await
        .map_err(|e| e.to_string())
    };

    match timeout(deadline, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(error = %e, "Detection worker failed");
            PredictionResult::failure()
        }
        Err(_) => {
            warn!(timeout_ms = deadline.as_millis() as u64, "Detection timed out");
            PredictionResult::failure()
        }
    }
}

/// Strip an optional data URL prefix and decode the base64 payload
pub fn decode_image_payload(image: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let image = image.trim();
    let encoded = match image.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => image,
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}
