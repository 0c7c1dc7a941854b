//! Task-based vendor: submit the image, poll the task, fetch the output.
//!
//! ```text
//! POST v1/tasks            -> { "task_id": "..." }
//! GET  v1/tasks/{task_id}  -> { "status": "queued" | "processing" | "succeeded" | "failed",
//!                               "output_url": "...", "error": "..." }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use unmark_common::UnmarkError;
use unmark_http::{Auth, HttpClient, MultipartField, RequestOpts};
use url::Url;

use crate::reply::resolve_output;
use crate::state::{FailureReason, PollObservation, RemovalOutput, RemovalState};
use crate::traits::{ImageSource, VendorError, WatermarkRemover};

const API_KEY_HEADER: &str = "x-api-key";

pub struct DewatermarkClient {
    http: HttpClient,
    api_key: HeaderValue,
    poll_interval: Duration,
    max_polls: u32,
    timeout: Duration,
    upload_by_url: bool,
}

#[derive(Serialize)]
struct SubmitByUrl<'a> {
    image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "id")]
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    output_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TaskResponse {
    fn observe(self) -> Result<PollObservation, VendorError> {
        match self.status.to_ascii_lowercase().as_str() {
            "queued" | "pending" | "processing" | "running" => Ok(PollObservation::Pending),
            "succeeded" | "success" | "completed" | "done" => {
                let raw = self.output_url.ok_or_else(|| {
                    VendorError::Decode("task succeeded without output_url".into())
                })?;
                let url = Url::parse(&raw)
                    .map_err(|e| VendorError::Decode(format!("bad output_url {raw:?}: {e}")))?;
                Ok(PollObservation::Done(RemovalOutput::Remote(url)))
            }
            "failed" | "error" | "cancelled" => Ok(PollObservation::Failed(
                self.error.unwrap_or_else(|| self.status.clone()),
            )),
            other => Err(VendorError::Decode(format!("unknown task status {other:?}"))),
        }
    }
}

impl DewatermarkClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, UnmarkError> {
        let http = HttpClient::new(base_url)
            .map_err(|e| UnmarkError::Config(format!("invalid dewatermark base_url: {e}")))?;
        let api_key = HeaderValue::from_str(api_key.trim())
            .map_err(|_| UnmarkError::Config("dewatermark api_key is not a valid header value".into()))?;
        Ok(Self {
            http,
            api_key,
            poll_interval: Duration::from_millis(1500),
            max_polls: 40,
            timeout: Duration::from_secs(60),
            upload_by_url: false,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.http = self.http.with_timeout(timeout);
        self
    }

    pub fn with_upload_by_url(mut self, enabled: bool) -> Self {
        self.upload_by_url = enabled;
        self
    }

    fn opts(&self) -> RequestOpts<'_> {
        RequestOpts {
            auth: Some(Auth::Header {
                name: HeaderName::from_static(API_KEY_HEADER),
                value: self.api_key.clone(),
            }),
            ..Default::default()
        }
    }

    async fn submit(&self, source: ImageSource) -> Result<String, VendorError> {
        let submitted: SubmitResponse = match source {
            ImageSource::Bytes {
                filename,
                format,
                bytes,
            } => {
                let fields = [MultipartField::file("image", filename, format.mime(), bytes)];
                self.http
                    .post_multipart("v1/tasks", &fields, self.opts())
                    .await?
                    .json()?
            }
            ImageSource::Url(url) => {
                self.http
                    .post_json(
                        "v1/tasks",
                        &SubmitByUrl {
                            image_url: url.as_str(),
                        },
                        self.opts(),
                    )
                    .await?
            }
        };
        tracing::debug!(task_id = %submitted.task_id, "vendor.dewatermark.submitted");
        Ok(submitted.task_id)
    }

    async fn poll(&self, task_id: &str) -> Result<PollObservation, VendorError> {
        let task: TaskResponse = self
            .http
            .get_json(&format!("v1/tasks/{task_id}"), self.opts())
            .await?;
        tracing::debug!(%task_id, status = %task.status, "vendor.dewatermark.poll");
        task.observe()
    }
}

#[async_trait]
impl WatermarkRemover for DewatermarkClient {
    fn name(&self) -> &str {
        "dewatermark"
    }

    fn supports_url(&self) -> bool {
        self.upload_by_url
    }

    async fn remove(&self, source: ImageSource) -> Result<Bytes, VendorError> {
        let task_id = self.submit(source).await?;
        let mut state = RemovalState::submitted(task_id);

        while !state.is_terminal() {
            let Some(task_id) = state.task_id().map(str::to_owned) else {
                break;
            };
            sleep(self.poll_interval).await;
            let observation = self.poll(&task_id).await?;
            state = state.advance(observation, self.max_polls);
        }

        match state {
            RemovalState::Succeeded { output } => {
                resolve_output(&self.http, output, self.timeout).await
            }
            RemovalState::Failed {
                reason: FailureReason::Vendor(message),
                ..
            } => Err(VendorError::Rejected(message)),
            RemovalState::Failed {
                task_id,
                reason: FailureReason::GaveUp { polls },
            } => Err(VendorError::Timeout { task_id, polls }),
            RemovalState::Submitted { task_id } | RemovalState::Polling { task_id, .. } => {
                Err(VendorError::Decode(format!("task {task_id} left unfinished")))
            }
        }
    }
}
