//! Asynchronous jobs: `POST /jobs`, `GET /status/{job_id}`, `GET /download/{name}`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use unmark_common::UnmarkError;
use unmark_pipeline::{JobSnapshot, JobStatus, JobStore, PipelineOutcome};
use uuid::Uuid;

use super::parse_listing_url;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    #[serde(flatten)]
    pub job: JobSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// POST /jobs
///
/// Registers a `processing` job and runs the pipeline in the background.
pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let url = parse_listing_url(&body.url)?;
    let job_id = state.jobs.create(url.as_str());

    let pipeline = state.pipeline.clone();
    let jobs = state.jobs.clone();
    tokio::spawn(async move {
        let result = pipeline.run_listing(&url).await;
        record_outcome(&jobs, job_id, result);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id,
            status_url: format!("/status/{job_id}"),
        }),
    ))
}

/// GET /status/{job_id}
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let id = parse_job_id(&job_id)?;
    let job = state
        .jobs
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown or expired job {job_id}")))?;
    let download_url = (job.status == JobStatus::Done).then(|| format!("/download/{id}"));
    Ok(Json(JobStatusResponse { job, download_url }))
}

/// GET /download/{name}
///
/// `name` is the job id, optionally followed by `.zip`.
pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let id = parse_job_id(name.strip_suffix(".zip").unwrap_or(&name))?;
    let archive = state
        .jobs
        .archive(id)
        .ok_or_else(|| ApiError::NotFound(format!("No archive for {name}")))?;
    tracing::info!(
        job_id = %id,
        archive = %archive.filename,
        size = archive.bytes.len(),
        "server.download"
    );

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive.filename),
            ),
        ],
        archive.bytes.clone(),
    )
        .into_response())
}

/// Stores a finished run on its job. Returns false when the job was evicted
/// while the pipeline ran.
fn record_outcome(
    jobs: &JobStore,
    job_id: Uuid,
    result: Result<PipelineOutcome, UnmarkError>,
) -> bool {
    match result {
        Ok(outcome) => {
            let processed = outcome.processed;
            if jobs.complete(job_id, outcome) {
                tracing::info!(%job_id, processed, "server.job.done");
                true
            } else {
                tracing::warn!(%job_id, processed, "server.job.evicted");
                false
            }
        }
        Err(err) => {
            if jobs.fail(job_id, err.to_string()) {
                tracing::warn!(%job_id, error = %err, "server.job.failed");
                true
            } else {
                tracing::warn!(%job_id, error = %err, "server.job.evicted");
                false
            }
        }
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Unknown job {raw}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use unmark_common::ProcessedImage;
    use unmark_pipeline::Archiver;

    use super::*;

    fn outcome() -> PipelineOutcome {
        let images = [ProcessedImage {
            filename: "panda_1.jpg".into(),
            bytes: Bytes::from_static(b"clean"),
        }];
        PipelineOutcome {
            archive: Archiver::build("panda", &images).unwrap(),
            attempted: 1,
            processed: 1,
            skipped: Vec::new(),
        }
    }

    #[test]
    fn records_success_and_failure_on_live_jobs() {
        let jobs = JobStore::new(Duration::from_secs(60), 4);
        let ok = jobs.create("https://dealer.example/a/1");
        let bad = jobs.create("https://dealer.example/b/2");

        assert!(record_outcome(&jobs, ok, Ok(outcome())));
        assert!(record_outcome(&jobs, bad, Err(UnmarkError::NoCandidates)));

        assert_eq!(jobs.get(ok).unwrap().status, JobStatus::Done);
        assert!(jobs.archive(ok).is_some());
        let failed = jobs.get(bad).unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert!(failed.error.unwrap().contains("No vehicle images"));
    }

    #[test]
    fn evicted_job_is_reported_not_completed() {
        let jobs = JobStore::new(Duration::from_secs(60), 1);
        let first = jobs.create("https://dealer.example/a/1");
        let second = jobs.create("https://dealer.example/b/2");

        assert!(jobs.get(first).is_none());
        assert!(!record_outcome(&jobs, first, Ok(outcome())));
        assert!(!record_outcome(&jobs, first, Err(UnmarkError::NoCandidates)));
        assert!(jobs.archive(first).is_none());
        assert_eq!(jobs.get(second).unwrap().status, JobStatus::Processing);
    }
}
