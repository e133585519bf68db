//! Abuse Guard Server
//!
//! Scores text for malicious/abusive content with a pre-trained classifier.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ABUSE GUARD                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  API      │  │  Rate     │  │  CSV Batch Pipeline     │ │
//! │  │  Gateway  │─▶│  Limiter  │─▶│  (parse / render)       │ │
//! │  │  (Axum)   │  │           │  │                         │ │
//! │  └───────────┘  └───────────┘  └────────────┬────────────┘ │
//! │                                             ▼              │
//! │  ┌───────────┐  ┌──────────────────────────────────────┐   │
//! │  │  Metrics  │◀─│  Predictor ─▶ Scoring Adapter         │   │
//! │  └───────────┘  │              (TF-IDF + LogReg)        │   │
//! │                 └──────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod batch;
mod config;
mod error;
mod handlers;
mod metrics;
mod middleware;
mod models;
mod predictor;
mod scoring;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::metrics::MetricsAggregator;
use crate::middleware::rate_limit::RateLimiter;
use crate::predictor::{Limits, Predictor};
use crate::scoring::ScoringAdapter;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    init_tracing(&config);

    tracing::info!("Abuse Guard starting...");
    tracing::info!("Model: {} (config: {})", config.model_path, config.config_path);

    // Classifier is loaded exactly once; failure aborts startup
    let scorer = ScoringAdapter::load(&config.model_path, &config.config_path)
        .context("Failed to load model artifacts. Train and export the model first")?;
    tracing::info!(
        positive_class = scorer.positive_class(),
        threshold = scorer.threshold(),
        "Scoring adapter ready"
    );

    // Build application state
    let metrics = Arc::new(MetricsAggregator::new());
    let limits = Limits {
        max_batch_size: config.max_batch_size,
        max_text_length: config.max_text_length,
    };
    let state = AppState {
        predictor: Arc::new(Predictor::new(scorer, metrics.clone(), limits)),
        metrics,
        limiter: Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window_seconds,
        )),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;

    Ok(())
}

fn init_tracing(config: &config::Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "abuse_guard=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub metrics: Arc<MetricsAggregator>,
    pub limiter: Arc<RateLimiter>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (not rate limited)
    let public_routes = Router::new()
        .route("/", get(handlers::root::info))
        .route("/health", get(handlers::health::check))
        .route("/metrics", get(handlers::metrics::snapshot));

    // Scoring routes - admission is checked before the body is read
    let scoring_routes = Router::new()
        .route("/predict", post(handlers::predict::predict))
        .route("/batch", post(handlers::batch::upload))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::enforce
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(scoring_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
