use std::sync::Arc;

use unmark_pipeline::{JobStore, Pipeline};
use unmark_vendors::WatermarkRemover;

/// Shared application state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub jobs: Arc<JobStore>,
    /// The pipeline's remover, also probed by the vendor diagnostics route.
    pub remover: Arc<dyn WatermarkRemover>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, jobs: Arc<JobStore>) -> Self {
        let remover = Arc::clone(pipeline.remover());
        Self {
            pipeline: Arc::new(pipeline),
            jobs,
            remover,
        }
    }
}
