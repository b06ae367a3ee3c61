//! Prelude module for the parafetch library
//!
//! Re-exports the items most integrations need, so a single
//! `use parafetch::prelude::*;` covers the common case.
//!
//! # Usage
//!
//! ```rust,no_run
//! use parafetch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = TransferEngine::new(EngineConfig::default())?;
//!     let request = TransferRequest::new("https://example.com/data.bin", "./downloads")
//!         .with_max_workers(4);
//!
//!     let handle = engine.spawn(request, None);
//!     let outcome = handle.wait().await;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Engine and request types
pub use crate::app::{
    BearerToken, ClientConfig, EngineConfig, ProgressSink, ProgressState, ResolvedSource,
    ResourceKind, RetryPolicy, TransferEngine, TransferHandle, TransferOutcome, TransferRequest,
    TransferStatus, UrlResolver,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_MAX_WORKERS, DEFAULT_MIN_CHUNK_SIZE, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());

        let request = TransferRequest::new("https://example.com/a.bin", PathBuf::from("out"));
        assert_eq!(request.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(request.min_chunk_size, DEFAULT_MIN_CHUNK_SIZE);

        let resolved = UrlResolver::default().classify("https://example.com/a.bin");
        assert_eq!(resolved.kind, ResourceKind::DirectFile);
    }
}
