//! Watermark-removal vendor integration.
//!
//! This crate exposes a common [`traits::WatermarkRemover`] interface and the
//! concrete vendor clients behind it: a synchronous upload API
//! ([`unwatermark`]), a submit/poll/fetch task API ([`dewatermark`]) driven by
//! the [`state::RemovalState`] machine, and a [`passthrough`] remover for dry
//! runs. [`build_remover`] picks one from configuration.
//!
//! # Examples
//! ```
//! use unmark_config::VendorConfig;
//! use unmark_vendors::build_remover;
//!
//! let remover = build_remover(&VendorConfig::Passthrough).unwrap();
//! assert_eq!(remover.name(), "passthrough");
//! ```
pub mod dewatermark;
pub mod passthrough;
mod reply;
pub mod state;
pub mod traits;
pub mod unwatermark;

use std::sync::Arc;
use std::time::Duration;

use dewatermark::DewatermarkClient;
use passthrough::PassthroughRemover;
use unmark_common::UnmarkError;
use unmark_config::VendorConfig;
use unwatermark::UnwatermarkClient;

pub use traits::{ImageSource, VendorError, VendorHealth, WatermarkRemover};

/// Instantiate the configured vendor client.
pub fn build_remover(config: &VendorConfig) -> Result<Arc<dyn WatermarkRemover>, UnmarkError> {
    match config {
        VendorConfig::Unwatermark {
            api_key,
            endpoint,
            timeout_secs,
        } => {
            let client = UnwatermarkClient::new(
                api_key.clone(),
                endpoint,
                Duration::from_secs(*timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        VendorConfig::Dewatermark {
            api_key,
            base_url,
            poll_interval_ms,
            max_polls,
            timeout_secs,
            upload_by_url,
        } => {
            let client = DewatermarkClient::new(api_key.clone(), base_url)?
                .with_polling(Duration::from_millis(*poll_interval_ms), *max_polls)
                .with_timeout(Duration::from_secs(*timeout_secs))
                .with_upload_by_url(*upload_by_url);
            Ok(Arc::new(client))
        }
        VendorConfig::Passthrough => Ok(Arc::new(PassthroughRemover)),
    }
}
