//! Core download engine
//!
//! Components, leaves first:
//!
//! - [`resolver`] classifies input URLs and derives the transfer URL
//! - [`planner`] inspects the origin and picks single-stream or parallel
//! - [`preflight`] checks free disk space before anything is written
//! - [`worker`] runs stream jobs and the chunk pool with retries
//! - [`progress`] aggregates byte counts and reports snapshots
//! - [`install`] verifies, merges and atomically installs the artifact
//! - [`archive`] unpacks repository archives
//! - [`transfer`] ties everything together behind [`TransferEngine`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use parafetch::app::{EngineConfig, TransferEngine, TransferRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TransferEngine::new(EngineConfig::default())?;
//! let request = TransferRequest::new(
//!     "https://github.com/acme/models/releases/download/v1.0/model.bin",
//!     "./models",
//! );
//!
//! let outcome = engine.transfer(request, None).await;
//! if outcome.success {
//!     println!("Saved to {:?}", outcome.path);
//! } else {
//!     eprintln!("Failed: {}", outcome.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod client;
pub mod install;
pub mod models;
pub mod planner;
pub mod preflight;
pub mod progress;
pub mod resolver;
pub mod transfer;
pub mod worker;

// Re-export main public API
pub use client::{BearerToken, ClientConfig, HttpClient};
pub use models::{
    derive_filename, ByteRange, ProgressState, RemoteMetadata, TransferPlan, TransferStatus,
    TransferStrategy,
};
pub use planner::{build_plan, split_ranges, PlanLimits, TransferPlanner};
pub use preflight::{DiskPreflight, PreflightOutcome};
pub use progress::{FanOutSink, NullSink, ProgressReporter, ProgressSink, ProgressTracker};
pub use resolver::{ResolvedSource, ResourceKind, UrlResolver};
pub use transfer::{EngineConfig, TransferEngine, TransferHandle, TransferOutcome, TransferRequest};
pub use worker::{
    AbortSignal, ChunkOrchestrator, ChunkState, ChunkTask, RetryPolicy, StreamWorker,
};
