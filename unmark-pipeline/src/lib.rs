//! From listing URL to ZIP archive.
//!
//! - [`archive::Archiver`]: in-memory Deflate ZIP of processed images
//! - [`pipeline::Pipeline`]: fetch, extract, download, clean, archive; one
//!   image at a time, skipping the ones that fail
//! - [`jobs::JobStore`]: expiring store of finished archives keyed by job id

pub mod archive;
pub mod jobs;
pub mod pipeline;

pub use archive::{Archive, Archiver};
pub use jobs::{JobSnapshot, JobStatus, JobStore, spawn_sweeper};
pub use pipeline::{Pipeline, PipelineOutcome, SkippedImage};
