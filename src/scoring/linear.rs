//! TF-IDF + logistic regression classifier
//!
//! Inference-only port of the exported text pipeline. The artifact carries
//! the fitted vocabulary, idf weights, linear coefficients and optional
//! sigmoid (Platt) calibration parameters.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use super::{class_names, read_json, Classifier, ModelError, ScoringError};

/// Default token pattern of the exported vectorizer: words of 2+ chars.
const TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

/// Sigmoid calibration: `p = 1 / (1 + exp(a * f + b))`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Calibration {
    pub a: f64,
    pub b: f64,
}

/// On-disk form of the classifier
#[derive(Debug, Deserialize)]
pub struct ModelArtifact {
    #[serde(deserialize_with = "class_names")]
    pub classes: Vec<String>,
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub calibration: Option<Calibration>,
}

fn default_lowercase() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

#[derive(Debug)]
pub struct TfidfLogisticModel {
    artifact: ModelArtifact,
    token_re: Regex,
}

impl TfidfLogisticModel {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        if artifact.classes.len() != 2 {
            return Err(ModelError::Invalid(format!(
                "binary classifier expected, got {} classes",
                artifact.classes.len()
            )));
        }
        if artifact.idf.len() != artifact.coef.len() {
            return Err(ModelError::Invalid(format!(
                "idf has {} weights but coef has {}",
                artifact.idf.len(),
                artifact.coef.len()
            )));
        }
        if let Some((term, col)) = artifact.vocabulary.iter().find(|(_, col)| **col >= artifact.idf.len()) {
            return Err(ModelError::Invalid(format!(
                "term '{}' maps to column {} beyond {} features",
                term,
                col,
                artifact.idf.len()
            )));
        }
        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ModelError::Invalid(format!("bad ngram_range ({}, {})", min_n, max_n)));
        }

        let token_re = Regex::new(TOKEN_PATTERN).map_err(|e| ModelError::Invalid(e.to_string()))?;
        Ok(Self { artifact, token_re })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = read_json(path.as_ref())?;
        Self::from_artifact(artifact)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.artifact.vocabulary.len()
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        let source = if self.artifact.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        self.token_re
            .find_iter(&source)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Sparse L2-normalized TF-IDF vector as (column, weight) pairs.
    fn features(&self, text: &str) -> Vec<(usize, f64)> {
        let tokens = self.tokens(text);
        let (min_n, max_n) = self.artifact.ngram_range;

        let mut counts: HashMap<usize, f64> = HashMap::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for gram in tokens.windows(n) {
                let term = gram.join(" ");
                if let Some(&col) = self.artifact.vocabulary.get(&term) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }
        }

        let mut weights: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(col, tf)| {
                let tf = if self.artifact.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (col, tf * self.artifact.idf[col])
            })
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in weights.iter_mut() {
                *w /= norm;
            }
        }
        weights
    }

    fn decision(&self, text: &str) -> f64 {
        self.features(text)
            .iter()
            .map(|(col, w)| self.artifact.coef[*col] * w)
            .sum::<f64>()
            + self.artifact.intercept
    }

    /// Probability of `classes[1]`.
    fn positive_probability(&self, text: &str) -> f64 {
        let f = self.decision(text);
        match self.artifact.calibration {
            Some(Calibration { a, b }) => 1.0 / (1.0 + (a * f + b).exp()),
            None => 1.0 / (1.0 + (-f).exp()),
        }
    }
}

impl Classifier for TfidfLogisticModel {
    fn classes(&self) -> &[String] {
        &self.artifact.classes
    }

    fn predict_proba(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, ScoringError> {
        texts
            .iter()
            .map(|text| {
                let p = self.positive_probability(text);
                if p.is_nan() {
                    return Err(ScoringError::Classifier(format!("non-numeric probability for text of {} bytes", text.len())));
                }
                Ok(vec![1.0 - p, p])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn artifact_json() -> &'static str {
        r#"{
            "classes": [0, 1],
            "vocabulary": {"bad": 0, "actor": 1, "hello": 2, "bad actor": 3},
            "idf": [1.5, 1.2, 1.1, 2.0],
            "coef": [3.0, 0.5, -2.0, 2.5],
            "intercept": -0.5,
            "ngram_range": [1, 2]
        }"#
    }

    fn model() -> TfidfLogisticModel {
        let artifact: ModelArtifact = serde_json::from_str(artifact_json()).unwrap();
        TfidfLogisticModel::from_artifact(artifact).unwrap()
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let model = model();
        let rows = model.predict_proba(&["Hello world".to_string(), "You are a bad actor!".to_string()]).unwrap();
        for row in &rows {
            assert_eq!(row.len(), 2);
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
        }
        assert!(rows[1][1] > rows[0][1]);
    }

    #[test]
    fn test_unknown_text_uses_intercept_only() {
        let model = model();
        let p = model.positive_probability("zzz qqq");
        let expected = 1.0 / (1.0 + 0.5_f64.exp());
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn test_bigrams_and_lowercase() {
        let model = model();
        let features = model.features("BAD Actor");
        let cols: Vec<usize> = {
            let mut c: Vec<usize> = features.iter().map(|(c, _)| *c).collect();
            c.sort();
            c
        };
        assert_eq!(cols, vec![0, 1, 3]);
        let norm: f64 = features.iter().map(|(_, w)| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_applied() {
        let mut artifact: ModelArtifact = serde_json::from_str(artifact_json()).unwrap();
        artifact.calibration = Some(Calibration { a: -1.0, b: 0.0 });
        let calibrated = TfidfLogisticModel::from_artifact(artifact).unwrap();
        // a = -1, b = 0 reduces to the plain logistic function
        let plain = model();
        let text = "bad actor";
        assert!((calibrated.positive_probability(text) - plain.positive_probability(text)).abs() < 1e-12);
    }

    #[test]
    fn test_inconsistent_artifact_rejected() {
        let mut artifact: ModelArtifact = serde_json::from_str(artifact_json()).unwrap();
        artifact.coef.pop();
        assert!(matches!(TfidfLogisticModel::from_artifact(artifact), Err(ModelError::Invalid(_))));

        let mut artifact: ModelArtifact = serde_json::from_str(artifact_json()).unwrap();
        artifact.vocabulary.insert("oops".to_string(), 99);
        assert!(matches!(TfidfLogisticModel::from_artifact(artifact), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(artifact_json().as_bytes()).unwrap();
        let model = TfidfLogisticModel::load(file.path()).unwrap();
        assert_eq!(model.classes(), &["0".to_string(), "1".to_string()]);
        assert_eq!(model.vocabulary_size(), 4);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TfidfLogisticModel::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
