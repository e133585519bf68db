//! Service info handler

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct ServiceInfo {
    message: &'static str,
    version: &'static str,
    endpoints: [&'static str; 4],
}

pub async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Abuse Detection API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ["/predict", "/batch", "/metrics", "/health"],
    })
}
