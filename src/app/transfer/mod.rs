//! Transfer engine
//!
//! [`TransferEngine::transfer`] is the single entry point: it classifies the
//! source, short-circuits when the artifact is already present, plans the
//! transfer, runs the disk preflight, executes the single-stream or parallel
//! strategy and installs the result. Every path ends in a
//! [`TransferOutcome`]; temporary files are removed on every failure path
//! before the outcome is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};
use url::Url;

use crate::app::archive;
use crate::app::client::HttpClient;
use crate::app::install::{self, ChunkWorkspace};
use crate::app::models::{derive_filename, ProgressState, TransferPlan, TransferStatus};
use crate::app::planner::TransferPlanner;
use crate::app::preflight::DiskPreflight;
use crate::app::progress::{
    format_bytes, FanOutSink, NullSink, ProgressReporter, ProgressSink, ProgressTracker,
};
use crate::app::resolver::{ResolvedSource, UrlResolver};
use crate::app::worker::{ChunkOrchestrator, StreamWorker};
use crate::errors::{AppError, DownloadError, DownloadResult, ResolveError};

pub mod config;
pub mod handle;
pub mod outcome;
pub mod request;

pub use config::EngineConfig;
pub use handle::TransferHandle;
pub use outcome::TransferOutcome;
pub use request::TransferRequest;

/// How a transfer finished successfully
enum Finished {
    Installed(PathBuf),
    Skipped(PathBuf, String),
}

/// Runs transfers against a shared HTTP client
#[derive(Debug, Clone)]
pub struct TransferEngine {
    client: HttpClient,
    config: Arc<EngineConfig>,
    resolver: UrlResolver,
}

impl TransferEngine {
    /// Create an engine
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::ConfigurationError` for invalid settings, or
    /// `Http` if the client cannot be built
    pub fn new(config: EngineConfig) -> DownloadResult<Self> {
        config.validate().map_err(DownloadError::ConfigurationError)?;
        let client = HttpClient::new(config.client.clone())?;
        let resolver = UrlResolver::new(config.archive_branch.clone())
            .with_web_origin(&config.github_origin)
            .map_err(|e| DownloadError::ConfigurationError(e.to_string()))?;
        Ok(Self {
            client,
            config: Arc::new(config),
            resolver,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Planner sharing this engine's client
    pub fn planner(&self) -> TransferPlanner {
        TransferPlanner::new(self.client.clone())
    }

    /// Start `request` in the background and return its handle
    pub fn spawn(
        &self,
        request: TransferRequest,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> TransferHandle {
        let source = self.resolver.classify(&request.url);
        let filename = self.target_filename(&request, &source);
        let initial = ProgressState::new(filename.clone(), request.dest_dir.join(&filename));
        let (tx, rx) = watch::channel(initial);

        let mut fan_out = FanOutSink::new().with(Arc::new(tx));
        if let Some(sink) = sink {
            fan_out = fan_out.with(sink);
        }

        let engine = self.clone();
        let task =
            tokio::spawn(async move { engine.transfer(request, Some(Arc::new(fan_out))).await });
        TransferHandle::new(rx, task)
    }

    /// Run `request` to completion
    ///
    /// `sink`, if given, receives progress snapshots whenever the percentage
    /// or status changes, including the terminal one.
    pub async fn transfer(
        &self,
        request: TransferRequest,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> TransferOutcome {
        let source = self.resolver.classify(&request.url);
        let filename = self.target_filename(&request, &source);
        let destination = request.dest_dir.join(&filename);

        let tracker = ProgressTracker::new(ProgressState::new(filename.clone(), destination.clone()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let sink = sink.unwrap_or_else(|| Arc::new(NullSink));
        let reporter = ProgressReporter::new(tracker.clone(), sink, self.config.progress_interval)
            .start(shutdown_rx);

        info!("Starting transfer of {} ({})", request.url, source.kind.label());
        debug!("Destination: {}", destination.display());

        let result = self
            .run(&request, &filename, &destination, &tracker)
            .await;

        let outcome = match result {
            Ok(Finished::Installed(path)) => {
                tracker.complete().await;
                info!("Transfer complete: {}", path.display());
                TransferOutcome::completed(path, "Download completed", tracker.snapshot().await)
            }
            Ok(Finished::Skipped(path, message)) => {
                info!("{}: {}", message, path.display());
                TransferOutcome::skipped(path, message, tracker.snapshot().await)
            }
            Err(e) => {
                error!("Transfer of {} failed ({}): {}", request.url, e.category(), e);
                tracker.fail(e.to_string()).await;
                TransferOutcome::failed(&e, tracker.snapshot().await)
            }
        };

        let _ = shutdown_tx.send(());
        if let Err(e) = reporter.await {
            debug!("Progress reporter ended abnormally: {}", e);
        }
        outcome
    }

    fn target_filename(&self, request: &TransferRequest, source: &ResolvedSource) -> String {
        if let Some(name) = request.filename.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        if let Some(name) = source.suggested_filename() {
            return name;
        }
        let url = if source.download_url.is_empty() {
            &request.url
        } else {
            &source.download_url
        };
        derive_filename(url, None)
    }

    async fn run(
        &self,
        request: &TransferRequest,
        filename: &str,
        destination: &Path,
        tracker: &ProgressTracker,
    ) -> Result<Finished, AppError> {
        request.validate().map_err(AppError::generic)?;
        let resolved = self.resolver.resolve(&request.url)?;

        let extract = resolved.is_archive() && request.extract_archive;
        if extract {
            let candidates = resolved.extracted_dir_candidates();
            if let Some(existing) = archive::find_extracted(&request.dest_dir, &candidates) {
                tracker.complete_existing(0).await;
                return Ok(Finished::Skipped(
                    existing,
                    "Repository already extracted".to_string(),
                ));
            }
        } else if !request.overwrite {
            if let Some(size) = existing_file_size(destination).await {
                tracker.complete_existing(size).await;
                return Ok(Finished::Skipped(
                    destination.to_path_buf(),
                    "File already exists".to_string(),
                ));
            }
        }

        let url = Url::parse(&resolved.download_url).map_err(|e| ResolveError::InvalidUrl {
            url: resolved.download_url.clone(),
            error: e.to_string(),
        })?;

        let plan = self
            .planner()
            .plan(&url, request.token.as_ref(), request.limits())
            .await;
        info!(
            "Plan for {}: {} strategy, size {}, {} chunk(s)",
            filename,
            plan.strategy,
            if plan.size_known() {
                format_bytes(plan.total_size)
            } else {
                "unknown".to_string()
            },
            plan.ranges.len().max(1)
        );
        tracker.set_total(plan.total_size).await;

        DiskPreflight::new(self.config.disk_margin_percent)
            .check(&request.dest_dir, plan.total_size)?;

        tokio::fs::create_dir_all(&request.dest_dir).await?;
        tracker.set_status(TransferStatus::Downloading).await;

        let worker = StreamWorker::new(
            self.client.clone(),
            request.token.clone(),
            self.config.retry.clone(),
            tracker.clone(),
        );

        if plan.is_parallel() {
            self.run_parallel(worker, request, &url, &plan, filename, destination)
                .await?;
        } else {
            self.run_single(worker, &url, &plan, destination).await?;
        }

        if extract {
            tracker.set_status(TransferStatus::Extracting).await;
            let root = archive::extract_and_remove(destination, &request.dest_dir).await?;
            return Ok(Finished::Installed(root));
        }
        Ok(Finished::Installed(destination.to_path_buf()))
    }

    async fn run_single(
        &self,
        worker: StreamWorker,
        url: &Url,
        plan: &TransferPlan,
        destination: &Path,
    ) -> DownloadResult<()> {
        let job = install::single_stream_job(url, plan.total_size, destination);

        let result = async {
            let report = worker.run(&job).await?;
            if report.attempts > 1 {
                info!("Stream recovered after {} attempts", report.attempts);
            }
            // Unknown sizes are checked against what the stream delivered
            let expected = if plan.size_known() {
                plan.total_size
            } else {
                report.bytes_written
            };
            install::verify_size(&job.output, expected).await?;
            install::install(&job.output, destination).await
        }
        .await;

        if result.is_err() {
            install::discard(&job.output).await;
        }
        result
    }

    async fn run_parallel(
        &self,
        worker: StreamWorker,
        request: &TransferRequest,
        url: &Url,
        plan: &TransferPlan,
        filename: &str,
        destination: &Path,
    ) -> DownloadResult<()> {
        let workspace = ChunkWorkspace::create(&request.dest_dir, filename).await?;
        let tasks = install::chunk_tasks(&workspace, &plan.ranges);
        let staging = install::staging_path(destination);

        let result = async {
            let declared: u64 = tasks.iter().map(|t| t.expected_len()).sum();
            if declared != plan.total_size {
                return Err(DownloadError::SizeMismatch {
                    expected: plan.total_size,
                    actual: declared,
                });
            }

            let orchestrator = ChunkOrchestrator::new(worker, request.max_workers);
            let tasks = orchestrator.run(url, plan.total_size, tasks).await?;

            install::verify_chunks(&tasks).await?;
            install::merge_chunks(&tasks, &staging).await?;
            install::verify_size(&staging, plan.total_size).await?;
            install::install(&staging, destination).await
        }
        .await;

        workspace.cleanup().await;
        if result.is_err() {
            install::discard(&staging).await;
        }
        result
    }
}

async fn existing_file_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Some(metadata.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine() -> TransferEngine {
        TransferEngine::new(EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unclassifiable_url_fails_without_network() {
        let temp_dir = TempDir::new().unwrap();
        let request = TransferRequest::new("ftp://example.com/file.bin", temp_dir.path());

        let outcome = engine().transfer(request, None).await;

        assert!(!outcome.success);
        assert!(outcome.path.is_none());
        assert_eq!(outcome.error_kind.as_deref(), Some("classification"));
        assert_eq!(outcome.progress.status, TransferStatus::Error);
    }

    #[tokio::test]
    async fn test_existing_file_short_circuits() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("file.bin"), vec![7u8; 1234]).unwrap();

        // Port 9 is unroutable; reaching the network would fail the transfer
        let request = TransferRequest::new("http://127.0.0.1:9/file.bin", temp_dir.path());
        let outcome = engine().transfer(request, None).await;

        assert!(outcome.success);
        assert!(outcome.skipped);
        assert_eq!(outcome.progress.total_size, 1234);
        assert_eq!(outcome.progress.downloaded, 1234);
        assert_eq!(outcome.progress.percentage, 100);
        assert_eq!(outcome.path, Some(temp_dir.path().join("file.bin")));
    }

    #[tokio::test]
    async fn test_extracted_repository_short_circuits() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("tools-main")).unwrap();

        let request = TransferRequest::new("https://github.com/acme/tools", temp_dir.path());
        let outcome = engine().transfer(request, None).await;

        assert!(outcome.success);
        assert!(outcome.skipped);
        assert_eq!(outcome.path, Some(temp_dir.path().join("tools-main")));
        assert_eq!(outcome.progress.filename, "tools.zip");
    }

    #[tokio::test]
    async fn test_invalid_request_is_a_failed_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let request =
            TransferRequest::new("https://example.com/f.bin", temp_dir.path()).with_max_workers(0);

        let outcome = engine().transfer(request, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind.as_deref(), Some("generic"));
    }

    #[tokio::test]
    async fn test_spawned_handle_starts_with_target_filename() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("tools-main")).unwrap();

        let handle = engine().spawn(
            TransferRequest::new("https://github.com/acme/tools", temp_dir.path()),
            None,
        );
        let initial = handle.progress();
        assert_eq!(initial.filename, "tools.zip");
        assert_eq!(initial.destination, temp_dir.path().join("tools.zip"));

        let outcome = handle.wait().await;
        assert_eq!(outcome.progress.filename, "tools.zip");
    }

    #[tokio::test]
    async fn test_spawned_handle_reports_terminal_state() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), b"abc").unwrap();

        let handle = engine().spawn(
            TransferRequest::new("http://127.0.0.1:9/a.txt", temp_dir.path()),
            None,
        );
        let updates = handle.subscribe();
        let outcome = handle.wait().await;

        assert!(outcome.skipped);
        assert_eq!(updates.borrow().status, TransferStatus::Completed);
    }
}
