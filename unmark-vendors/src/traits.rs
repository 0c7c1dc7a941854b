use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use unmark_common::{ImageFormat, UnmarkError};
use unmark_http::HttpError;
use url::Url;

/// 1x1 transparent PNG used by [`WatermarkRemover::health_check`].
pub const PROBE_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// What gets sent to the vendor: downloaded bytes, or the CDN URL for vendors
/// that fetch the image themselves.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes {
        filename: String,
        format: ImageFormat,
        bytes: Bytes,
    },
    Url(Url),
}

impl ImageSource {
    pub fn bytes(filename: impl Into<String>, format: ImageFormat, bytes: Bytes) -> Self {
        Self::Bytes {
            filename: filename.into(),
            format,
            bytes,
        }
    }
}

/// Result of a vendor connectivity probe, served by `GET /test_<vendor>`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VendorHealth {
    pub vendor: String,
    pub ok: bool,
    pub latency_ms: u64,
    pub detail: String,
}

#[derive(thiserror::Error, Debug)]
pub enum VendorError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The vendor answered but refused or failed the job.
    #[error("Vendor rejected the image: {0}")]
    Rejected(String),

    /// The reply could not be turned into image bytes.
    #[error("Unexpected vendor reply: {0}")]
    Decode(String),

    #[error("Vendor task {task_id} still pending after {polls} polls")]
    Timeout { task_id: String, polls: u32 },

    #[error("{vendor} does not accept {what}")]
    Unsupported {
        vendor: &'static str,
        what: &'static str,
    },
}

impl From<VendorError> for UnmarkError {
    fn from(err: VendorError) -> Self {
        UnmarkError::Vendor(err.to_string())
    }
}

#[async_trait]
pub trait WatermarkRemover: Send + Sync {
    /// Provider identifier (`unwatermark`, `dewatermark`, ...).
    fn name(&self) -> &str;

    /// Whether [`ImageSource::Url`] is accepted.
    fn supports_url(&self) -> bool {
        false
    }

    /// Return the cleaned image bytes. A vendor failure is always an error;
    /// the original bytes are never handed back in its place.
    async fn remove(&self, source: ImageSource) -> Result<Bytes, VendorError>;

    /// Push a tiny probe image through [`WatermarkRemover::remove`].
    async fn health_check(&self) -> VendorHealth {
        let started = Instant::now();
        let probe = ImageSource::bytes("probe.png", ImageFormat::Png, Bytes::from_static(PROBE_PNG));
        let outcome = self.remove(probe).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(bytes) => VendorHealth {
                vendor: self.name().to_string(),
                ok: true,
                latency_ms,
                detail: format!("received {} bytes", bytes.len()),
            },
            Err(err) => {
                tracing::warn!(vendor = self.name(), error = %err, "vendor.health.failed");
                VendorHealth {
                    vendor: self.name().to_string(),
                    ok: false,
                    latency_ms,
                    detail: err.to_string(),
                }
            }
        }
    }
}
