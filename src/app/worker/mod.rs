//! Download workers
//!
//! - [`config`] - retry policy and backoff schedule
//! - [`types`] - chunk tasks, stream jobs and reports
//! - [`core`] - the stream worker that executes one job with retries
//! - [`pool`] - the chunk orchestrator that runs a parallel plan
//!
//! Workers never communicate with each other except through the shared
//! progress tracker and abort signal.

pub mod config;
pub mod core;
pub mod pool;
pub mod types;

pub use config::RetryPolicy;
pub use core::{parse_content_range, AbortSignal, StreamWorker};
pub use pool::ChunkOrchestrator;
pub use types::{ChunkState, ChunkTask, StreamJob, StreamReport};
