//! Listing page and image retrieval with a browser-like `User-Agent`.
use std::time::Duration;

use unmark_common::{ImageCandidate, UnmarkError};
use unmark_config::ScraperConfig;
use unmark_http::{Backoff, Fetched, HttpClient, HttpError, RequestOpts};
use url::Url;

/// Fetches listing HTML and candidate image bytes.
#[derive(Clone)]
pub struct PageFetcher {
    http: HttpClient,
    page_timeout: Duration,
    page_attempts: usize,
    image_timeout: Duration,
}

impl PageFetcher {
    pub fn new(cfg: &ScraperConfig) -> Result<Self, UnmarkError> {
        let http = HttpClient::standalone()
            .and_then(|c| c.with_user_agent(&cfg.user_agent))
            .map_err(|e| UnmarkError::Config(format!("page fetcher: {e}")))?
            .with_backoff(Backoff::Fixed(cfg.retry_backoff()));
        Ok(Self {
            http,
            page_timeout: cfg.page_timeout(),
            page_attempts: cfg.page_retries.max(1),
            image_timeout: cfg.image_timeout(),
        })
    }

    /// GET the listing page. Transport errors, 429 and 5xx are retried with a
    /// fixed delay until the attempt budget is spent.
    pub async fn fetch_html(&self, url: &Url) -> Result<String, UnmarkError> {
        tracing::info!(url = %url, attempts = self.page_attempts, "scrape.fetch.start");
        let opts = RequestOpts {
            timeout: Some(self.page_timeout),
            retries: Some(self.page_attempts - 1),
            ..Default::default()
        };
        match self.http.get_text(url.as_str(), opts).await {
            Ok(html) => {
                tracing::info!(url = %url, bytes = html.len(), "scrape.fetch.done");
                Ok(html)
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "scrape.fetch.failed");
                Err(UnmarkError::PageFetch(describe_http_error(&err)))
            }
        }
    }

    /// Download one candidate. Single attempt; the caller skips failures.
    pub async fn fetch_image(&self, candidate: &ImageCandidate) -> Result<Fetched, UnmarkError> {
        let opts = RequestOpts {
            timeout: Some(self.image_timeout),
            retries: Some(0),
            ..Default::default()
        };
        let fetched = self
            .http
            .get_bytes(candidate.url.as_str(), opts)
            .await
            .map_err(|e| UnmarkError::ImageDownload(describe_http_error(&e)))?;

        if fetched.bytes.is_empty() {
            return Err(UnmarkError::ImageDownload(format!(
                "empty image body from {}",
                candidate.url
            )));
        }
        if let Some(mime) = fetched.mime() {
            if mime.starts_with("text/") || mime.contains("html") || fetched.is_json() {
                return Err(UnmarkError::ImageDownload(format!(
                    "{} returned {mime} instead of an image",
                    candidate.url
                )));
            }
        }
        tracing::debug!(
            url = %candidate.url,
            index = candidate.index,
            size = fetched.bytes.len(),
            "scrape.image.downloaded"
        );
        Ok(fetched)
    }
}

fn describe_http_error(err: &HttpError) -> String {
    match err {
        HttpError::Api { status, .. } => format!("upstream answered {status}"),
        other => other.to_string(),
    }
}
