//! parafetch library
//!
//! Downloads a single file over HTTP(S), splitting it into byte ranges that
//! are fetched concurrently when the server supports it. GitHub web URLs are
//! resolved to their raw, release or archive download form. Every transfer is
//! size-verified and installed atomically.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
