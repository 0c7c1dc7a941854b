pub mod health;
pub mod jobs;
pub mod web;

use unmark_common::UnmarkError;
use url::Url;

use crate::error::ApiError;

/// Parse and check a listing URL supplied by a client.
pub(crate) fn parse_listing_url(raw: &str) -> Result<Url, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest("Missing listing URL".into()));
    }
    let url = Url::parse(raw)
        .map_err(|e| UnmarkError::InvalidInput(format!("{raw} is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UnmarkError::InvalidInput(format!("{raw} is not an http(s) URL")).into());
    }
    Ok(url)
}
