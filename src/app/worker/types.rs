//! Worker type definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::models::ByteRange;

/// Completion state of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// One byte range of a parallel transfer and its part file
///
/// Moved into the task that downloads it and handed back when that task
/// finishes, so no two workers ever hold the same chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    /// Position in range order
    pub index: usize,
    /// Declared byte range
    pub range: ByteRange,
    /// Part file inside the transfer's chunk directory
    pub part_path: PathBuf,
    /// Completion state
    pub state: ChunkState,
    /// Attempts the worker needed, 0 until it has run
    pub attempts: u32,
}

impl ChunkTask {
    pub fn new(index: usize, range: ByteRange, part_path: PathBuf) -> Self {
        Self {
            index,
            range,
            part_path,
            state: ChunkState::Pending,
            attempts: 0,
        }
    }

    /// Declared length in bytes
    pub fn expected_len(&self) -> u64 {
        self.range.len()
    }
}

/// A single streaming download, ranged or whole
#[derive(Debug, Clone)]
pub struct StreamJob {
    /// Source URL
    pub url: Url,
    /// Byte range for chunk requests, `None` for a whole-file stream
    pub range: Option<ByteRange>,
    /// Planned total size of the resource (0 = unknown)
    pub planned_total: u64,
    /// File the body is written to (truncated on every attempt)
    pub output: PathBuf,
    /// Label used in log lines
    pub label: String,
}

impl StreamJob {
    /// Job for one chunk of a parallel transfer
    pub fn for_chunk(url: &Url, task: &ChunkTask, planned_total: u64) -> Self {
        Self {
            url: url.clone(),
            range: Some(task.range),
            planned_total,
            output: task.part_path.clone(),
            label: format!("chunk {}", task.index),
        }
    }

    /// Job for a single-stream transfer
    pub fn whole(url: &Url, planned_total: u64, output: PathBuf) -> Self {
        Self {
            url: url.clone(),
            range: None,
            planned_total,
            output,
            label: "stream".to_string(),
        }
    }

    /// Bytes this job must deliver, when known
    pub fn expected_len(&self) -> Option<u64> {
        match self.range {
            Some(range) => Some(range.len()),
            None if self.planned_total > 0 => Some(self.planned_total),
            None => None,
        }
    }
}

/// Result of a finished stream job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    /// Bytes in the output file
    pub bytes_written: u64,
    /// Attempts used, including the successful one
    pub attempts: u32,
}
