use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use unmark_common::UnmarkError;

/// Handler-level error. Renders as a plain-text body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Unmark(#[from] UnmarkError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unmark(err) => match err {
                UnmarkError::PageFetch(_)
                | UnmarkError::ImageDownload(_)
                | UnmarkError::NoCandidates
                | UnmarkError::NothingProcessed { .. }
                | UnmarkError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                UnmarkError::JobNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                UnmarkError::Vendor(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                UnmarkError::Config(_) | UnmarkError::Archive(_) | UnmarkError::Internal(_) => {
                    tracing::error!(error = %err, "server.internal_error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An internal error occurred".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_client_error() {
            tracing::info!(%status, %message, "server.request_rejected");
        }
        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}
