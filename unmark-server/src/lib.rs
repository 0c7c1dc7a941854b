//! HTTP surface for the listing watermark stripper.
//!
//! The router is built by [`router::build_app_router`] so the binary and the
//! integration tests run the same middleware stack.

pub mod error;
pub mod handlers;
pub mod page;
pub mod router;
pub mod state;

pub use router::build_app_router;
pub use state::AppState;
