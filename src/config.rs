//! Configuration module

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Path of the exported classifier artifact
    pub model_path: String,

    /// Path of the scoring config (positive class + threshold)
    pub config_path: String,

    /// Requests admitted per client within one window
    pub rate_limit_max_requests: usize,

    /// Sliding window length in seconds
    pub rate_limit_window_seconds: u64,

    /// Maximum number of texts per request
    pub max_batch_size: usize,

    /// Maximum characters per text
    pub max_text_length: usize,

    /// Body limit for CSV uploads
    pub max_upload_bytes: usize,

    /// Key rate limits on the last X-Forwarded-For hop (only behind a trusted proxy)
    pub trust_forwarded_for: bool,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            model_path: "abuse_detector_model.json".to_string(),
            config_path: "abuse_detector_config.json".to_string(),
            rate_limit_max_requests: 100,
            rate_limit_window_seconds: 60,
            max_batch_size: 100,
            max_text_length: 10_000,
            max_upload_bytes: 10 * 1024 * 1024,
            trust_forwarded_for: false,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: parse_var("PORT").unwrap_or(defaults.port),

            model_path: env::var("MODEL_PATH").unwrap_or(defaults.model_path),

            config_path: env::var("CONFIG_PATH").unwrap_or(defaults.config_path),

            rate_limit_max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or(defaults.rate_limit_max_requests),

            rate_limit_window_seconds: parse_var("RATE_LIMIT_WINDOW_SECONDS")
                .unwrap_or(defaults.rate_limit_window_seconds),

            max_batch_size: parse_var("MAX_BATCH_SIZE").unwrap_or(defaults.max_batch_size),

            max_text_length: parse_var("MAX_TEXT_LENGTH").unwrap_or(defaults.max_text_length),

            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),

            trust_forwarded_for: parse_var("TRUST_FORWARDED_FOR").unwrap_or(defaults.trust_forwarded_for),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(config.rate_limit_window_seconds, 60);
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.max_text_length, 10_000);
        assert!(!config.trust_forwarded_for);
        assert!(!config.is_production());
    }
}
