//! Health endpoints.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use telemetry::health;

/// Full component health report.
pub async fn health_handler() -> impl IntoResponse {
    let report = health().report();
    let status = if report.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report))
}

/// Readiness: can the service answer read requests.
pub async fn ready_handler() -> impl IntoResponse {
    if health().is_ready() {
        (StatusCode::OK, Json(json!({"ready": true})))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"ready": false})))
    }
}

/// Liveness: is the process running.
pub async fn live_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"alive": true})))
}
