use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use unmark_vendors::VendorHealth;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /test_{vendor}
///
/// Pushes a probe image through the configured vendor; 502 when it fails.
pub async fn vendor_test(State(state): State<AppState>) -> (StatusCode, Json<VendorHealth>) {
    let report = state.remover.health_check().await;
    tracing::info!(
        vendor = %report.vendor,
        ok = report.ok,
        latency_ms = report.latency_ms,
        "server.vendor_test"
    );
    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(report))
}
