//! Metrics handler

use axum::{extract::State, Json};

use crate::AppState;
use crate::metrics::MetricsSnapshot;

pub async fn snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
