//! Chunk orchestration for parallel transfers
//!
//! Spawns one task per chunk and bounds how many run at once with a
//! semaphore. The first permanent failure raises the shared abort signal so
//! siblings stop early; the orchestrator still waits for every task before
//! returning, so nothing is left writing into the chunk directory.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use url::Url;

use super::core::{AbortSignal, StreamWorker};
use super::types::{ChunkState, ChunkTask, StreamJob};
use crate::errors::{DownloadError, DownloadResult};

/// Runs the chunks of a parallel plan on a bounded pool
#[derive(Debug)]
pub struct ChunkOrchestrator {
    worker: StreamWorker,
    max_workers: usize,
}

impl ChunkOrchestrator {
    /// Create an orchestrator; the worker's abort signal is replaced with a
    /// fresh one owned by this orchestrator
    pub fn new(worker: StreamWorker, max_workers: usize) -> Self {
        Self {
            worker: worker.with_abort_signal(Arc::new(AbortSignal::default())),
            max_workers: max_workers.max(1),
        }
    }

    /// Download every chunk of `tasks` from `url`
    ///
    /// Returns the tasks in range order, all `Done`, once every chunk
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::ChunkFailed` for the lowest-index chunk that
    /// failed on its own account (not merely aborted), or `WorkerPanic` if a
    /// task did not run to completion.
    pub async fn run(
        &self,
        url: &Url,
        planned_total: u64,
        tasks: Vec<ChunkTask>,
    ) -> DownloadResult<Vec<ChunkTask>> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let chunk_count = tasks.len();
        info!(
            "Downloading {} chunks with up to {} workers",
            chunk_count, self.max_workers
        );

        let mut indices = Vec::with_capacity(chunk_count);
        let mut handles = Vec::with_capacity(chunk_count);

        for mut task in tasks {
            let semaphore = semaphore.clone();
            let worker = self.worker.clone();
            let job = StreamJob::for_chunk(url, &task, planned_total);
            indices.push(task.index);

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        task.state = ChunkState::Failed;
                        return (task, Err(DownloadError::Aborted));
                    }
                };
                if worker.is_aborted() {
                    task.state = ChunkState::Failed;
                    return (task, Err(DownloadError::Aborted));
                }

                task.state = ChunkState::InProgress;
                debug!("Chunk {} started: bytes {}", task.index, task.range);

                let result = worker.run(&job).await;
                match &result {
                    Ok(report) => {
                        task.state = ChunkState::Done;
                        task.attempts = report.attempts;
                    }
                    Err(DownloadError::Aborted) => task.state = ChunkState::Failed,
                    Err(e) => {
                        error!("Chunk {} failed permanently: {}", task.index, e);
                        task.state = ChunkState::Failed;
                        worker.abort();
                    }
                }
                (task, result.map(|_| ()))
            }));
        }

        let joined = join_all(handles).await;

        let mut finished = Vec::with_capacity(chunk_count);
        let mut failure: Option<DownloadError> = None;
        let mut aborted = false;

        for (index, joined) in indices.into_iter().zip(joined) {
            match joined {
                Ok((task, Ok(()))) => finished.push(task),
                Ok((task, Err(DownloadError::Aborted))) => {
                    aborted = true;
                    finished.push(task);
                }
                Ok((task, Err(e))) => {
                    if failure.is_none() {
                        failure = Some(DownloadError::ChunkFailed {
                            index: task.index,
                            reason: e.to_string(),
                        });
                    }
                    finished.push(task);
                }
                Err(join_error) => {
                    self.worker.abort();
                    if failure.is_none() {
                        failure = Some(DownloadError::WorkerPanic {
                            index,
                            reason: join_error.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        if aborted {
            return Err(DownloadError::Aborted);
        }

        finished.sort_by_key(|task| task.index);
        let retries: u32 = finished
            .iter()
            .map(|task| task.attempts.saturating_sub(1))
            .sum();
        if retries > 0 {
            info!(
                "All {} chunks completed after {} retried attempt(s)",
                finished.len(),
                retries
            );
        } else {
            debug!("All {} chunks completed", finished.len());
        }
        Ok(finished)
    }
}
