//! Transfer requests

use std::path::PathBuf;

use crate::app::client::BearerToken;
use crate::app::planner::PlanLimits;
use crate::constants::transfer;

/// Parameters of one transfer, immutable once it starts
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL as given by the caller
    pub url: String,
    /// Directory the artifact is installed into
    pub dest_dir: PathBuf,
    /// Explicit filename, derived from the URL when absent
    pub filename: Option<String>,
    /// Replace an existing destination file
    pub overwrite: bool,
    /// Bearer credential sent on every request
    pub token: Option<BearerToken>,
    /// Ceiling on concurrent chunk workers
    pub max_workers: usize,
    /// Minimum chunk size and parallel threshold
    pub min_chunk_size: u64,
    /// Unpack repository archives after download
    pub extract_archive: bool,
}

impl TransferRequest {
    /// Request with default limits
    pub fn new(url: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest_dir: dest_dir.into(),
            filename: None,
            overwrite: false,
            token: None,
            max_workers: transfer::DEFAULT_MAX_WORKERS,
            min_chunk_size: transfer::DEFAULT_MIN_CHUNK_SIZE,
            extract_archive: true,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the bearer credential; blank tokens are ignored
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = BearerToken::new(token);
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_min_chunk_size(mut self, min_chunk_size: u64) -> Self {
        self.min_chunk_size = min_chunk_size;
        self
    }

    pub fn with_extract_archive(mut self, extract: bool) -> Self {
        self.extract_archive = extract;
        self
    }

    /// Limits used to plan the transfer
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            max_workers: self.max_workers,
            min_chunk_size: self.min_chunk_size,
        }
    }

    /// Validate the request
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("source URL must not be empty".to_string());
        }
        if self.dest_dir.as_os_str().is_empty() {
            return Err("destination directory must not be empty".to_string());
        }
        if let Some(name) = &self.filename {
            if name.contains(['/', '\\']) || name == ".." || name == "." {
                return Err(format!("filename '{name}' must be a plain file name"));
            }
        }
        self.limits().validate()
    }
}
