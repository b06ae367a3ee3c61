//! Stream worker implementation
//!
//! A [`StreamWorker`] runs one [`StreamJob`] to completion: it issues the GET
//! (range-restricted for chunks), validates the response against the plan,
//! streams the body into the job's output file and retries transient failures
//! on the policy's backoff schedule.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use reqwest::{Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::config::RetryPolicy;
use super::types::{StreamJob, StreamReport};
use crate::app::client::{BearerToken, HttpClient};
use crate::app::progress::ProgressTracker;
use crate::errors::{DownloadError, DownloadResult};

/// Stop signal shared by the workers of one transfer
///
/// Raising it wakes every worker that is waiting on the network or sleeping
/// between retries.
#[derive(Debug, Default)]
pub struct AbortSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl AbortSignal {
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Resolve once the signal has been raised
    pub async fn raised(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent raise is not missed
        notified.as_mut().enable();
        if self.is_raised() {
            return;
        }
        notified.await;
    }
}

/// Executes stream jobs with retries and progress accounting
#[derive(Debug, Clone)]
pub struct StreamWorker {
    client: HttpClient,
    token: Option<BearerToken>,
    retry: RetryPolicy,
    progress: ProgressTracker,
    abort: Arc<AbortSignal>,
}

impl StreamWorker {
    pub fn new(
        client: HttpClient,
        token: Option<BearerToken>,
        retry: RetryPolicy,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            client,
            token,
            retry,
            progress,
            abort: Arc::new(AbortSignal::default()),
        }
    }

    /// Share an abort signal with sibling workers
    pub fn with_abort_signal(mut self, abort: Arc<AbortSignal>) -> Self {
        self.abort = abort;
        self
    }

    /// Signal every worker sharing this signal to stop
    pub fn abort(&self) {
        self.abort.raise();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_raised()
    }

    /// Run `job`, retrying transient failures
    ///
    /// Progress only counts bytes beyond the furthest point any attempt of
    /// this job reached, so a retry never double counts or rewinds.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, `MaxRetriesExceeded` once the retry
    /// budget is spent, or `Aborted` when a sibling failed. An abort raised
    /// mid-request or mid-backoff ends the job without waiting for it.
    pub async fn run(&self, job: &StreamJob) -> DownloadResult<StreamReport> {
        let attempts = AtomicU32::new(0);
        let high_water = AtomicU64::new(0);
        let (attempts, high_water) = (&attempts, &high_water);
        let max_retries = self.retry.max_retries;

        let operation = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.attempt(job, high_water).await.map_err(|e| {
                if !e.is_transient() {
                    backoff::Error::permanent(e)
                } else if attempt > max_retries {
                    backoff::Error::permanent(DownloadError::MaxRetriesExceeded {
                        max_retries,
                        last_error: e.to_string(),
                    })
                } else {
                    backoff::Error::transient(e)
                }
            })
        };

        let notify = |err: DownloadError, delay: Duration| {
            warn!(
                "{} of {} failed (attempt {}/{}): {}. Retrying in {}ms",
                job.label,
                job.url,
                attempts.load(Ordering::SeqCst),
                self.retry.max_attempts(),
                err,
                delay.as_millis()
            );
        };

        let retried = backoff::future::retry_notify(self.retry.backoff(), operation, notify);
        let bytes_written = tokio::select! {
            result = retried => result?,
            _ = self.abort.raised() => {
                debug!("{} stopped by abort signal", job.label);
                return Err(DownloadError::Aborted);
            }
        };

        let report = StreamReport {
            bytes_written,
            attempts: attempts.load(Ordering::SeqCst),
        };
        debug!(
            "{} finished: {} bytes in {} attempt(s)",
            job.label, report.bytes_written, report.attempts
        );
        Ok(report)
    }

    async fn attempt(&self, job: &StreamJob, high_water: &AtomicU64) -> DownloadResult<u64> {
        if self.is_aborted() {
            return Err(DownloadError::Aborted);
        }

        let read_timeout = self.client.read_timeout();
        let timed_out = || DownloadError::Timeout {
            seconds: read_timeout.as_secs(),
        };

        let request = self.client.get(&job.url, self.token.as_ref(), job.range);
        let response = timeout(read_timeout, request.send())
            .await
            .map_err(|_| timed_out())??;

        let declared = check_response(job, &response)?;
        let expected = job.expected_len().or(declared);

        let mut file = File::create(&job.output).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = timeout(read_timeout, stream.next())
            .await
            .map_err(|_| timed_out())?
        {
            let chunk = chunk?;
            if self.is_aborted() {
                return Err(DownloadError::Aborted);
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            self.record_progress(written, high_water).await;
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected {
            if written < expected {
                return Err(DownloadError::IncompleteDownload {
                    received: written,
                    expected,
                });
            }
        }
        Ok(written)
    }

    async fn record_progress(&self, written: u64, high_water: &AtomicU64) {
        let previous = high_water.fetch_max(written, Ordering::SeqCst);
        if written > previous {
            self.progress.add_bytes(written - previous).await;
        }
    }
}

/// Validate status and headers against the job; returns the declared body length
fn check_response(job: &StreamJob, response: &Response) -> DownloadResult<Option<u64>> {
    let status = response.status();

    let Some(range) = job.range else {
        if !status.is_success() {
            return Err(DownloadError::ServerError {
                status: status.as_u16(),
            });
        }
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(declared) = declared {
            if job.planned_total > 0 && declared != job.planned_total {
                return Err(DownloadError::SizeChanged {
                    planned: job.planned_total,
                    reported: declared,
                });
            }
        }
        return Ok(declared);
    };

    if status != StatusCode::PARTIAL_CONTENT {
        if status.is_success() {
            return Err(DownloadError::RangeNotHonored {
                start: range.start,
                end: range.end,
                status: status.as_u16(),
            });
        }
        return Err(DownloadError::ServerError {
            status: status.as_u16(),
        });
    }

    if let Some(value) = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
    {
        let mismatch = || DownloadError::RangeMismatch {
            requested: range.to_string(),
            received: value.to_string(),
        };
        let (start, end, total) = parse_content_range(value).ok_or_else(mismatch)?;

        if let Some(total) = total {
            if job.planned_total > 0 && total != job.planned_total {
                return Err(DownloadError::SizeChanged {
                    planned: job.planned_total,
                    reported: total,
                });
            }
        }
        if start != range.start || end != range.end {
            return Err(mismatch());
        }
    }

    Ok(Some(range.len()))
}

/// Parse `bytes <start>-<end>/<total|*>`
pub fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?, total))
}
