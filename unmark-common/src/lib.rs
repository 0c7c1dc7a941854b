//! Common types and utilities shared across unmark crates.
//!
//! This crate defines the image domain model, the shared error type, and the
//! observability helpers used throughout the workspace. It stays
//! dependency-light so that every crate can depend on it.
//!
//! # Overview
//!
//! - [`ImageFormat`], [`ImageCandidate`], [`ProcessedImage`]: the request-scoped
//!   entities flowing through the pipeline
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`UnmarkError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use unmark_common::ImageFormat;
//!
//! assert_eq!(ImageFormat::from_extension("JPEG"), Some(ImageFormat::Jpeg));
//! assert!(ImageFormat::WebP.sort_priority() < ImageFormat::Png.sort_priority());
//! ```
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

pub mod observability;

/// Image encodings recognised on listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    WebP,
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Map a file extension (without the dot) to a format, ignoring case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "webp" => Some(Self::WebP),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Canonical extension used when naming archive entries.
    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Lower sorts first. WebP variants are preferred over everything else.
    pub fn sort_priority(self) -> u8 {
        match self {
            Self::WebP => 0,
            Self::Jpeg | Self::Png => 1,
        }
    }
}

/// An image URL found on a listing page.
///
/// `index` is the 1-based position after dedupe, ordering and truncation; it
/// is what the archive entry name is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub url: Url,
    pub format: ImageFormat,
    pub index: usize,
}

/// Bytes returned by the watermark-removal vendor, ready to be archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub filename: String,
    pub bytes: Bytes,
}

/// Error types used across the unmark system.
#[derive(thiserror::Error, Debug)]
pub enum UnmarkError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listing page could not be retrieved.
    #[error("Failed to fetch listing page: {0}")]
    PageFetch(String),

    /// A candidate image could not be downloaded.
    #[error("Failed to download image: {0}")]
    ImageDownload(String),

    /// The listing page contained no image matching the CDN pattern.
    #[error("No vehicle images found on the listing page")]
    NoCandidates,

    /// Every candidate failed to download or process.
    #[error("None of the {attempted} images could be processed")]
    NothingProcessed { attempted: usize },

    /// The watermark-removal vendor rejected or failed a request.
    #[error("Vendor error: {0}")]
    Vendor(String),

    /// Building the ZIP archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The caller supplied something we cannot work with.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A referenced job is unknown or has expired.
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`UnmarkError`].
pub type Result<T> = std::result::Result<T, UnmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_normalise_jpeg() {
        assert_eq!(ImageFormat::from_extension("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("JpEg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::from_extension("gif"), None);
    }

    #[test]
    fn nothing_processed_message_mentions_count() {
        let err = UnmarkError::NothingProcessed { attempted: 4 };
        assert_eq!(err.to_string(), "None of the 4 images could be processed");
    }
}
