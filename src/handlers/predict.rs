//! Prediction handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{AppState, AppError, AppResult};
use crate::models::{BatchResult, PredictRequest};
use crate::predictor;

/// Score a list of texts
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<BatchResult>> {
    let Json(req) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;

    let result = predictor::predict_async(state.predictor.clone(), req.texts).await?;
    Ok(Json(result))
}
