use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, warn};

use super::AppState;
use crate::error::TrendError;
use crate::ml::{FeatureVector, PredictionInput};

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let metadata = state.metadata().await;
    Json(json!({
        "status": "ok",
        "trained_at": metadata.trained_at,
        "accuracy": metadata.accuracy,
    }))
}

/// Accepts the 12 externally supplied fields; Price_Range and
/// Price_Change are derived here, never taken from the request.
pub async fn post_predict(
    State(state): State<AppState>,
    Json(input): Json<PredictionInput>,
) -> impl IntoResponse {
    let vector = FeatureVector::from_external(&input);
    let predictor = state.predictor().await;

    match predictor.predict(&vector) {
        Ok(prediction) => {
            debug!(trend = %prediction.trend, "served prediction");
            (StatusCode::OK, Json(json!(prediction)))
        }
        Err(e) => {
            warn!("prediction rejected: {}", e);
            (error_status(&e), Json(json!({ "error": e.to_string() })))
        }
    }
}

pub async fn post_reload(State(state): State<AppState>) -> impl IntoResponse {
    match state.reload().await {
        Ok(metadata) => (
            StatusCode::OK,
            Json(json!({
                "status": "reloaded",
                "trained_at": metadata.trained_at,
                "accuracy": metadata.accuracy,
            })),
        ),
        Err(e) => {
            warn!("artifact reload failed: {}", e);
            (error_status(&e), Json(json!({ "error": e.to_string() })))
        }
    }
}

fn error_status(e: &TrendError) -> StatusCode {
    match e {
        TrendError::InputValidation(_) | TrendError::SchemaMismatch(_) => StatusCode::BAD_REQUEST,
        TrendError::ArtifactMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
