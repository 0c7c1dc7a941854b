use async_trait::async_trait;
use bytes::Bytes;

use crate::traits::{ImageSource, VendorError, WatermarkRemover};

/// Hands the input back untouched. Useful for dry runs and local testing.
pub struct PassthroughRemover;

#[async_trait]
impl WatermarkRemover for PassthroughRemover {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn remove(&self, source: ImageSource) -> Result<Bytes, VendorError> {
        match source {
            ImageSource::Bytes { bytes, .. } => Ok(bytes),
            ImageSource::Url(_) => Err(VendorError::Unsupported {
                vendor: "passthrough",
                what: "image URLs",
            }),
        }
    }
}
