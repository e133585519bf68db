//! Prediction Orchestrator
//!
//! Validates input, drives the scoring adapter and records metrics.
//! A request is all-or-nothing: it is either fully scored or rejected.

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::MetricsAggregator;
use crate::models::{BatchResult, PredictionItem};
use crate::scoring::ScoringAdapter;
use crate::{AppError, AppResult};

/// Input bounds enforced before scoring
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_batch_size: usize,
    pub max_text_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_text_length: 10_000,
        }
    }
}

#[derive(Debug)]
pub struct Predictor {
    scorer: ScoringAdapter,
    metrics: Arc<MetricsAggregator>,
    limits: Limits,
}

impl Predictor {
    pub fn new(scorer: ScoringAdapter, metrics: Arc<MetricsAggregator>, limits: Limits) -> Self {
        Self { scorer, metrics, limits }
    }

    /// Score `texts`, output `i` corresponding to input `i`
    pub fn predict(&self, texts: Vec<String>) -> AppResult<BatchResult> {
        self.validate(&texts)?;

        let started = Instant::now();
        let verdicts = match self.scorer.score(&texts) {
            Ok(verdicts) => verdicts,
            Err(e) => {
                self.metrics.record_error();
                tracing::error!(texts = texts.len(), error = %e, "Scoring failed");
                return Err(e.into());
            }
        };
        let latency = started.elapsed();

        let threshold = self.scorer.threshold();
        let predictions: Vec<PredictionItem> = texts
            .into_iter()
            .zip(verdicts)
            .map(|(text, verdict)| PredictionItem {
                text,
                label: verdict.label,
                probability: verdict.probability,
                threshold,
            })
            .collect();

        let result = BatchResult::new(predictions, latency.as_secs_f64() * 1000.0);

        match result.predictions.as_slice() {
            [single] => self.metrics.record_single(single.label, latency),
            _ => self.metrics.record_batch(&result.labels(), latency),
        }

        tracing::debug!(
            total = result.predictions.len(),
            malicious = result.malicious_count,
            latency_ms = result.total_latency_ms,
            "Prediction complete"
        );

        Ok(result)
    }

    fn validate(&self, texts: &[String]) -> AppResult<()> {
        if texts.is_empty() {
            return Err(AppError::ValidationError("No texts provided".to_string()));
        }
        if texts.len() > self.limits.max_batch_size {
            return Err(AppError::ValidationError(format!(
                "Too many texts: {} (maximum {})",
                texts.len(),
                self.limits.max_batch_size
            )));
        }

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                return Err(AppError::ValidationError(format!("texts[{}] is empty", i)));
            }
            let chars = text.chars().count();
            if chars > self.limits.max_text_length {
                return Err(AppError::ValidationError(format!(
                    "texts[{}] has {} characters (maximum {})",
                    i, chars, self.limits.max_text_length
                )));
            }
        }

        Ok(())
    }
}

/// Run `predict` on the blocking pool, off the async workers
pub async fn predict_async(predictor: Arc<Predictor>, texts: Vec<String>) -> AppResult<BatchResult> {
    tokio::task::spawn_blocking(move || predictor.predict(texts))
        .await
        .map_err(|e| AppError::InternalError(format!("Prediction task failed: {}", e)))?
}
