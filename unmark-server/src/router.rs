use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use unmark_config::ServerConfig;

use crate::handlers::{health, jobs, web};
use crate::state::AppState;

/// Build the application [`Router`] with its middleware stack.
///
/// The vendor diagnostics route is named after the configured vendor,
/// e.g. `/test_unwatermark`.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let vendor_route = format!("/test_{}", state.remover.name());

    Router::new()
        .route("/", get(web::index).post(web::submit))
        .route("/jobs", post(jobs::create_job))
        .route("/status/{job_id}", get(jobs::job_status))
        .route("/download/{name}", get(jobs::download))
        .route(&vendor_route, get(health::vendor_test))
        .route("/health", get(health::health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
