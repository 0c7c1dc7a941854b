//! Browser form: `GET /` and `POST /`.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::Html;
use axum::Form;
use bytes::Bytes;
use serde::Deserialize;
use url::Url;

use super::parse_listing_url;
use crate::error::{ApiError, ApiResult};
use crate::page;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListingForm {
    #[serde(default)]
    pub url: String,
}

enum Submission {
    Listing(Url),
    Upload { filename: String, bytes: Bytes },
}

/// GET /
pub async fn index() -> Html<String> {
    Html(page::form_page().into_string())
}

/// POST /
///
/// Runs the pipeline inline and answers with a page linking to the archive.
/// An uploaded file takes precedence over a URL sent in the same form.
pub async fn submit(State(state): State<AppState>, request: Request) -> ApiResult<Html<String>> {
    let (source, outcome) = match read_submission(&state, request).await? {
        Submission::Listing(url) => {
            tracing::info!(url = %url, "server.submit.listing");
            let outcome = state.pipeline.run_listing(&url).await?;
            (url.to_string(), outcome)
        }
        Submission::Upload { filename, bytes } => {
            tracing::info!(%filename, size = bytes.len(), "server.submit.upload");
            let outcome = state.pipeline.run_upload(&filename, bytes).await?;
            (filename, outcome)
        }
    };

    let job_id = state.jobs.create(&source);
    let html = page::result_page(job_id, &outcome).into_string();
    if !state.jobs.complete(job_id, outcome) {
        tracing::warn!(%job_id, "server.submit.evicted");
    }
    Ok(Html(html))
}

async fn read_submission(state: &AppState, request: Request) -> ApiResult<Submission> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        let Form(form) = Form::<ListingForm>::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        return parse_listing_url(&form.url).map(Submission::Listing);
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut url = None;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("url") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                if !text.trim().is_empty() {
                    url = Some(text);
                }
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.jpg").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    upload = Some(Submission::Upload { filename, bytes });
                }
            }
            _ => {}
        }
    }

    match (upload, url) {
        (Some(upload), _) => Ok(upload),
        (None, Some(raw)) => parse_listing_url(&raw).map(Submission::Listing),
        (None, None) => Err(ApiError::BadRequest(
            "Provide a listing URL or an image file".into(),
        )),
    }
}
