//! Handle to a spawned transfer
//!
//! Owned by the caller: poll [`TransferHandle::progress`], subscribe to
//! snapshots, or await the outcome. There is no process-wide registry.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::outcome::TransferOutcome;
use crate::app::models::ProgressState;
use crate::errors::AppError;

/// A transfer running on the tokio runtime
#[derive(Debug)]
pub struct TransferHandle {
    progress: watch::Receiver<ProgressState>,
    task: JoinHandle<TransferOutcome>,
}

impl TransferHandle {
    pub(crate) fn new(
        progress: watch::Receiver<ProgressState>,
        task: JoinHandle<TransferOutcome>,
    ) -> Self {
        Self { progress, task }
    }

    /// Latest reported snapshot
    pub fn progress(&self) -> ProgressState {
        self.progress.borrow().clone()
    }

    /// Receiver notified on every reported snapshot
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.progress.clone()
    }

    /// Whether the transfer task has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the outcome
    pub async fn wait(self) -> TransferOutcome {
        let last = self.progress.borrow().clone();
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = AppError::generic(format!("transfer task terminated: {e}"));
                TransferOutcome::failed(&error, last)
            }
        }
    }
}
