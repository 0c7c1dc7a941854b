//! Listing page acquisition and image URL extraction.
//!
//! - [`fetch::PageFetcher`]: browser-like GET with a fixed-backoff retry loop
//! - [`extract::ImageExtractor`]: CDN-pattern match, dedupe, WebP-first, cap
//! - [`naming`]: model name and archive entry names derived from the listing URL

pub mod extract;
pub mod fetch;
pub mod naming;

pub use extract::ImageExtractor;
pub use fetch::PageFetcher;
