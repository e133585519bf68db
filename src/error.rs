//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::{header, StatusCode},
    Json,
};
use serde_json::json;

use crate::scoring::ScoringError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Caller errors
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("malformed CSV: {0}")]
    FormatError(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    // Server errors
    #[error("scoring failed: {0}")]
    ScoringError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::FormatError(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ScoringError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::ValidationError(msg) => msg.clone(),
            AppError::FormatError(msg) => msg.clone(),
            AppError::RateLimitExceeded { .. } => "Rate limit exceeded".to_string(),
            AppError::ScoringError(msg) => {
                tracing::error!("Scoring error: {}", msg);
                "Prediction failed".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        if let AppError::RateLimitExceeded { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after_secs.into());
        }
        response
    }
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::ScoringError(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::FormatError(err.to_string())
    }
}
