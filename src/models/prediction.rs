//! Prediction models

use serde::{Deserialize, Serialize};

use crate::scoring::Label;

/// Scored input text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionItem {
    pub text: String,
    pub label: Label,
    #[serde(rename = "probability_malicious")]
    pub probability: f64,
    pub threshold: f64,
}

/// Result of one predict call, items in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub predictions: Vec<PredictionItem>,
    pub malicious_count: usize,
    pub benign_count: usize,
    pub total_latency_ms: f64,
}

impl BatchResult {
    pub fn new(predictions: Vec<PredictionItem>, total_latency_ms: f64) -> Self {
        let malicious_count = predictions
            .iter()
            .filter(|p| p.label == Label::Malicious)
            .count();
        let benign_count = predictions.len() - malicious_count;

        Self {
            predictions,
            malicious_count,
            benign_count,
            total_latency_ms,
        }
    }

    pub fn labels(&self) -> Vec<Label> {
        self.predictions.iter().map(|p| p.label).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub texts: Vec<String>,
}
