//! In-process job registry.
//!
//! Finished archives live here until their TTL runs out; a background sweeper
//! drops expired entries. Jobs still processing never expire. When the store
//! is full the oldest finished job is evicted first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use unmark_config::JobsConfig;
use uuid::Uuid;

use crate::archive::Archive;
use crate::pipeline::PipelineOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Error,
}

#[derive(Debug)]
struct JobEntry {
    source: String,
    status: JobStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    archive: Option<Arc<Archive>>,
    error: Option<String>,
    attempted: usize,
    processed: usize,
    skipped: usize,
}

impl JobEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        self.status != JobStatus::Processing && now - self.updated_at >= ttl
    }

    fn snapshot(&self, job_id: Uuid) -> JobSnapshot {
        JobSnapshot {
            job_id,
            status: self.status,
            source: self.source.clone(),
            created_at: self.created_at,
            archive_name: self.archive.as_ref().map(|a| a.filename.clone()),
            entries: self
                .archive
                .as_ref()
                .map(|a| a.entries.clone())
                .unwrap_or_default(),
            error: self.error.clone(),
            attempted: self.attempted,
            processed: self.processed,
            skipped: self.skipped,
        }
    }
}

/// Point-in-time view of a job, safe to serialize.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_name: Option<String>,
    pub entries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted: usize,
    pub processed: usize,
    pub skipped: usize,
}

pub struct JobStore {
    jobs: DashMap<Uuid, JobEntry>,
    ttl: TimeDelta,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(ttl: Duration, max_jobs: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            max_jobs: max_jobs.max(1),
        }
    }

    pub fn from_config(cfg: &JobsConfig) -> Self {
        Self::new(cfg.ttl(), cfg.max_jobs)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Register a new job in `processing` state.
    pub fn create(&self, source: &str) -> Uuid {
        let now = Utc::now();
        self.sweep_at(now);
        while self.jobs.len() >= self.max_jobs {
            // Finished jobs go before running ones, then oldest first.
            let oldest = self
                .jobs
                .iter()
                .min_by_key(|e| (e.status == JobStatus::Processing, e.created_at))
                .map(|e| *e.key());
            match oldest {
                Some(id) => {
                    self.jobs.remove(&id);
                    tracing::debug!(job_id = %id, "jobs.evicted");
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        self.jobs.insert(
            id,
            JobEntry {
                source: source.to_string(),
                status: JobStatus::Processing,
                created_at: now,
                updated_at: now,
                archive: None,
                error: None,
                attempted: 0,
                processed: 0,
                skipped: 0,
            },
        );
        tracing::debug!(job_id = %id, %source, "jobs.created");
        id
    }

    /// Attach the finished archive. Returns false if the job is gone.
    pub fn complete(&self, id: Uuid, outcome: PipelineOutcome) -> bool {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return false;
        };
        entry.status = JobStatus::Done;
        entry.updated_at = Utc::now();
        entry.attempted = outcome.attempted;
        entry.processed = outcome.processed;
        entry.skipped = outcome.skipped.len();
        entry.archive = Some(Arc::new(outcome.archive));
        true
    }

    pub fn fail(&self, id: Uuid, message: impl Into<String>) -> bool {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return false;
        };
        entry.status = JobStatus::Error;
        entry.updated_at = Utc::now();
        entry.error = Some(message.into());
        true
    }

    /// Snapshot of a live job; expired entries are removed on sight.
    pub fn get(&self, id: Uuid) -> Option<JobSnapshot> {
        let now = Utc::now();
        self.jobs.remove_if(&id, |_, e| e.is_expired(now, self.ttl));
        self.jobs.get(&id).map(|e| e.snapshot(id))
    }

    /// The archive of a job in `done` state.
    pub fn archive(&self, id: Uuid) -> Option<Arc<Archive>> {
        let now = Utc::now();
        self.jobs.remove_if(&id, |_, e| e.is_expired(now, self.ttl));
        self.jobs
            .get(&id)
            .filter(|e| e.status == JobStatus::Done)
            .and_then(|e| e.archive.clone())
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Drop every entry expired as of `now`; returns how many went.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, e| !e.is_expired(now, self.ttl));
        before.saturating_sub(self.jobs.len())
    }
}

/// Run [`JobStore::sweep`] every `interval` until `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<JobStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "jobs.sweeper.started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("jobs.sweeper.stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        tracing::info!(removed, remaining = store.len(), "jobs.sweeper.purged");
                    }
                }
            }
        }
    })
}
