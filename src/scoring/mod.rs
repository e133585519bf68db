//! Scoring Adapter
//!
//! Wraps the external classifier and the scoring config, turning raw
//! positive-class probabilities into thresholded verdicts.

pub mod linear;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

pub use linear::TfidfLogisticModel;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure while scoring a request. Fatal for the request, never retried.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("classifier returned {actual} rows for {expected} texts")]
    RowCount { expected: usize, actual: usize },

    #[error("row {row} has {actual} columns, expected {expected}")]
    RowWidth { row: usize, expected: usize, actual: usize },

    #[error("row {row} has probability {value} outside [0, 1]")]
    InvalidProbability { row: usize, value: f64 },
}

/// Failure while loading the model artifacts. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("positive class '{class}' not among classifier classes {classes:?}")]
    UnknownPositiveClass { class: String, classes: Vec<String> },

    #[error("optimal threshold {0} outside [0, 1]")]
    InvalidThreshold(f64),
}

// ============================================================================
// CLASSIFIER INTERFACE
// ============================================================================

/// Black-box probabilistic text classifier.
///
/// Implementations must be safe to call concurrently once loaded.
pub trait Classifier: Send + Sync {
    /// Output class ordering; column `i` of every probability row belongs to `classes()[i]`.
    fn classes(&self) -> &[String];

    /// One probability row per input text.
    fn predict_proba(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, ScoringError>;
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Positive class and decision threshold, loaded once alongside the classifier.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(deserialize_with = "class_name")]
    pub positive_class: String,
    pub optimal_threshold: f64,
}

impl ScoringConfig {
    pub fn new(positive_class: impl Into<String>, optimal_threshold: f64) -> Self {
        Self {
            positive_class: positive_class.into(),
            optimal_threshold,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        read_json(path.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Malicious,
    Benign,
}

impl Label {
    /// Threshold is inclusive: `probability == threshold` is malicious.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Label::Malicious
        } else {
            Label::Benign
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Malicious => "MALICIOUS",
            Label::Benign => "BENIGN",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored text: label and positive-class probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub label: Label,
    pub probability: f64,
}

// ============================================================================
// ADAPTER
// ============================================================================

pub struct ScoringAdapter {
    classifier: Arc<dyn Classifier>,
    config: ScoringConfig,
    positive_index: usize,
}

impl fmt::Debug for ScoringAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringAdapter")
            .field("classes", &self.classifier.classes())
            .field("config", &self.config)
            .field("positive_index", &self.positive_index)
            .finish()
    }
}

impl ScoringAdapter {
    /// Bind a classifier to its config, resolving the positive class column once.
    pub fn new(classifier: Arc<dyn Classifier>, config: ScoringConfig) -> Result<Self, ModelError> {
        let threshold = config.optimal_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ModelError::InvalidThreshold(threshold));
        }

        let positive_index = classifier
            .classes()
            .iter()
            .position(|c| *c == config.positive_class)
            .ok_or_else(|| ModelError::UnknownPositiveClass {
                class: config.positive_class.clone(),
                classes: classifier.classes().to_vec(),
            })?;

        Ok(Self {
            classifier,
            config,
            positive_index,
        })
    }

    /// Load the JSON classifier artifact and scoring config from disk.
    pub fn load(model_path: impl AsRef<Path>, config_path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let model = TfidfLogisticModel::load(model_path)?;
        let config = ScoringConfig::load(config_path)?;

        tracing::info!(
            classes = ?model.classes(),
            vocabulary = model.vocabulary_size(),
            positive_class = %config.positive_class,
            threshold = config.optimal_threshold,
            "Classifier loaded"
        );

        Self::new(Arc::new(model), config)
    }

    pub fn threshold(&self) -> f64 {
        self.config.optimal_threshold
    }

    pub fn positive_class(&self) -> &str {
        &self.config.positive_class
    }

    /// Score texts, one verdict per input in input order.
    pub fn score(&self, texts: &[String]) -> Result<Vec<Verdict>, ScoringError> {
        let rows = self.classifier.predict_proba(texts)?;
        if rows.len() != texts.len() {
            return Err(ScoringError::RowCount {
                expected: texts.len(),
                actual: rows.len(),
            });
        }

        let width = self.classifier.classes().len();
        let threshold = self.threshold();

        rows.iter()
            .enumerate()
            .map(|(row, probs)| {
                if probs.len() != width {
                    return Err(ScoringError::RowWidth {
                        row,
                        expected: width,
                        actual: probs.len(),
                    });
                }
                let probability = probs[self.positive_index];
                if !(0.0..=1.0).contains(&probability) {
                    return Err(ScoringError::InvalidProbability { row, value: probability });
                }
                Ok(Verdict {
                    label: Label::from_probability(probability, threshold),
                    probability,
                })
            })
            .collect()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let display = path.display().to_string();
    let raw = std::fs::read(path).map_err(|source| ModelError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ModelError::Parse { path: display, source })
}

/// Class identifiers may be exported as strings, integers or booleans.
pub(crate) fn class_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    value_to_class(&value).ok_or_else(|| serde::de::Error::custom(format!("unsupported class identifier {value}")))
}

pub(crate) fn class_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    values
        .iter()
        .map(|v| value_to_class(v).ok_or_else(|| serde::de::Error::custom(format!("unsupported class identifier {v}"))))
        .collect()
}

fn value_to_class(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
