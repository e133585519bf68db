//! CSV batch handler

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        State,
    },
    http::header,
    response::IntoResponse,
};

use crate::{AppState, AppError, AppResult};
use crate::batch;
use crate::predictor;

const UPLOAD_FIELD: &str = "file";

/// Score every row of an uploaded CSV and return the annotated CSV
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
    let mut multipart = multipart.map_err(|e| AppError::FormatError(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::FormatError(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::FormatError(format!("Failed to read upload: {}", e)))?;
            upload = Some(bytes);
            break;
        }
    }

    let raw = upload.ok_or_else(|| {
        AppError::FormatError(format!("Missing '{}' field in upload", UPLOAD_FIELD))
    })?;

    let texts = batch::parse(&raw)?;
    let result = predictor::predict_async(state.predictor.clone(), texts).await?;
    let body = batch::render(&result)?;

    tracing::info!(
        rows = result.predictions.len(),
        malicious = result.malicious_count,
        latency_ms = result.total_latency_ms,
        "Batch processed"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"predictions.csv\""),
        ],
        body,
    ))
}
