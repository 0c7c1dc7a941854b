use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use unmark_common::{ImageCandidate, ProcessedImage, UnmarkError};
use unmark_config::ScraperConfig;
use unmark_scrape::naming::{designated_filename, model_name, upload_parts};
use unmark_scrape::{ImageExtractor, PageFetcher};
use unmark_vendors::{ImageSource, WatermarkRemover};
use url::Url;

use crate::archive::{Archive, Archiver};

/// A candidate that did not make it into the archive.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedImage {
    pub url: String,
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub archive: Archive,
    pub attempted: usize,
    pub processed: usize,
    pub skipped: Vec<SkippedImage>,
}

pub struct Pipeline {
    fetcher: PageFetcher,
    extractor: ImageExtractor,
    remover: Arc<dyn WatermarkRemover>,
}

impl Pipeline {
    pub fn new(
        fetcher: PageFetcher,
        extractor: ImageExtractor,
        remover: Arc<dyn WatermarkRemover>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            remover,
        }
    }

    pub fn from_config(
        cfg: &ScraperConfig,
        remover: Arc<dyn WatermarkRemover>,
    ) -> Result<Self, UnmarkError> {
        Ok(Self::new(
            PageFetcher::new(cfg)?,
            ImageExtractor::from_config(cfg)?,
            remover,
        ))
    }

    pub fn remover(&self) -> &Arc<dyn WatermarkRemover> {
        &self.remover
    }

    /// Scrape a listing and archive every image the vendor cleaned.
    ///
    /// Candidates are handled one after another in listing order. A failed
    /// download or vendor call drops that image only; the request fails when
    /// the page cannot be fetched, has no candidates, or nothing survives.
    pub async fn run_listing(&self, listing: &Url) -> Result<PipelineOutcome, UnmarkError> {
        let html = self.fetcher.fetch_html(listing).await?;
        let candidates = self.extractor.extract(&html);
        if candidates.is_empty() {
            tracing::warn!(url = %listing, "pipeline.no_candidates");
            return Err(UnmarkError::NoCandidates);
        }

        let model = model_name(listing);
        let attempted = candidates.len();
        tracing::info!(url = %listing, %model, attempted, "pipeline.listing.start");

        let mut processed = Vec::with_capacity(attempted);
        let mut skipped = Vec::new();
        for candidate in &candidates {
            let filename = designated_filename(&model, candidate);
            match self.process_candidate(candidate, &filename).await {
                Ok(bytes) => processed.push(ProcessedImage { filename, bytes }),
                Err(err) => {
                    tracing::warn!(
                        url = %candidate.url,
                        %filename,
                        error = %err,
                        "pipeline.image.skipped"
                    );
                    skipped.push(SkippedImage {
                        url: candidate.url.to_string(),
                        filename,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if processed.is_empty() {
            tracing::warn!(url = %listing, attempted, "pipeline.listing.nothing_processed");
            return Err(UnmarkError::NothingProcessed { attempted });
        }

        let archive = Archiver::build(&model, &processed)?;
        tracing::info!(
            url = %listing,
            archive = %archive.filename,
            attempted,
            processed = processed.len(),
            skipped = skipped.len(),
            "pipeline.listing.done"
        );
        Ok(PipelineOutcome {
            archive,
            attempted,
            processed: processed.len(),
            skipped,
        })
    }

    /// Clean a single uploaded image; the archive holds `{stem}_clean.{ext}`.
    pub async fn run_upload(
        &self,
        filename: &str,
        bytes: Bytes,
    ) -> Result<PipelineOutcome, UnmarkError> {
        if bytes.is_empty() {
            return Err(UnmarkError::InvalidInput("uploaded file is empty".into()));
        }
        let (stem, format) = upload_parts(filename);
        let entry = format!("{stem}_clean.{}", format.extension());
        tracing::info!(%filename, size = bytes.len(), "pipeline.upload.start");

        let source = ImageSource::bytes(entry.clone(), format, bytes);
        let cleaned = match self.remover.remove(source).await {
            Ok(cleaned) => cleaned,
            Err(err) => {
                tracing::warn!(%filename, error = %err, "pipeline.image.skipped");
                return Err(UnmarkError::NothingProcessed { attempted: 1 });
            }
        };

        let archive = Archiver::build(
            &stem,
            &[ProcessedImage {
                filename: entry,
                bytes: cleaned,
            }],
        )?;
        Ok(PipelineOutcome {
            archive,
            attempted: 1,
            processed: 1,
            skipped: Vec::new(),
        })
    }

    async fn process_candidate(
        &self,
        candidate: &ImageCandidate,
        filename: &str,
    ) -> Result<Bytes, UnmarkError> {
        let source = if self.remover.supports_url() {
            ImageSource::Url(candidate.url.clone())
        } else {
            let fetched = self.fetcher.fetch_image(candidate).await?;
            ImageSource::bytes(filename, candidate.format, fetched.bytes)
        };
        let cleaned = self.remover.remove(source).await?;
        if cleaned.is_empty() {
            return Err(UnmarkError::Vendor("vendor returned an empty image".into()));
        }
        tracing::debug!(
            url = %candidate.url,
            %filename,
            size = cleaned.len(),
            vendor = self.remover.name(),
            "pipeline.image.cleaned"
        );
        Ok(cleaned)
    }
}
