//! Transfer planning
//!
//! Asks the origin for size and range support, then decides between a
//! single stream and parallel byte-range chunks. Planning never fails: when
//! both metadata requests are rejected the plan falls back to a single
//! stream of unknown size.

use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH};
use tracing::{debug, warn};
use url::Url;

use crate::app::client::{BearerToken, HttpClient};
use crate::app::models::{ByteRange, RemoteMetadata, TransferPlan, TransferStrategy};
use crate::constants::{http, transfer};

/// Limits that shape the chunk split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Ceiling on concurrent chunks
    pub max_workers: usize,
    /// Minimum chunk size, also the parallel threshold
    pub min_chunk_size: u64,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_workers: transfer::DEFAULT_MAX_WORKERS,
            min_chunk_size: transfer::DEFAULT_MIN_CHUNK_SIZE,
        }
    }
}

impl PlanLimits {
    /// Validate the limits
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }
        if self.max_workers > transfer::MAX_WORKER_LIMIT {
            return Err(format!(
                "max_workers must not exceed {}",
                transfer::MAX_WORKER_LIMIT
            ));
        }
        if self.min_chunk_size == 0 {
            return Err("min_chunk_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Inspects origins and builds transfer plans
#[derive(Debug, Clone)]
pub struct TransferPlanner {
    client: HttpClient,
}

impl TransferPlanner {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Inspect `url` and build its plan
    pub async fn plan(
        &self,
        url: &Url,
        token: Option<&BearerToken>,
        limits: PlanLimits,
    ) -> TransferPlan {
        let metadata = self.inspect(url, token).await;
        build_plan(url.as_str(), metadata, limits)
    }

    /// Learn size and range support, HEAD first, then a header-only GET
    pub async fn inspect(&self, url: &Url, token: Option<&BearerToken>) -> RemoteMetadata {
        match self.client.head(url, token).send().await {
            Ok(response) if response.status().is_success() => {
                let metadata = metadata_from_headers(response.headers());
                debug!(
                    "HEAD {}: size={} ranges={}",
                    url, metadata.total_size, metadata.accepts_ranges
                );
                return metadata;
            }
            Ok(response) => {
                debug!("HEAD {} rejected with {}, trying GET", url, response.status());
            }
            Err(e) => {
                debug!("HEAD {} failed: {}, trying GET", url, e);
            }
        }

        match self.client.metadata_get(url, token).send().await {
            Ok(response) if response.status().is_success() => {
                let metadata = metadata_from_headers(response.headers());
                // Dropping the response closes the body unread
                drop(response);
                debug!(
                    "GET {}: size={} ranges={}",
                    url, metadata.total_size, metadata.accepts_ranges
                );
                metadata
            }
            Ok(response) => {
                warn!(
                    "Metadata request for {} returned {}; assuming unknown size",
                    url,
                    response.status()
                );
                RemoteMetadata::conservative()
            }
            Err(e) => {
                warn!(
                    "Metadata request for {} failed: {}; assuming unknown size",
                    url, e
                );
                RemoteMetadata::conservative()
            }
        }
    }
}

/// Extract size and range support from response headers
pub fn metadata_from_headers(headers: &HeaderMap) -> RemoteMetadata {
    let total_size = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let accepts_ranges = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains(http::RANGE_UNIT_BYTES))
        .unwrap_or(false);

    RemoteMetadata {
        total_size,
        accepts_ranges,
    }
}

/// Decide the strategy for fetched metadata
///
/// Parallel requires range support and a known size above the minimum chunk
/// size. A split that would yield a single chunk stays single-stream.
pub fn build_plan(url: &str, metadata: RemoteMetadata, limits: PlanLimits) -> TransferPlan {
    let RemoteMetadata {
        total_size,
        accepts_ranges,
    } = metadata;

    let mut ranges = if accepts_ranges && total_size > limits.min_chunk_size {
        split_ranges(total_size, limits.max_workers, limits.min_chunk_size)
    } else {
        Vec::new()
    };

    let strategy = if ranges.len() > 1 {
        TransferStrategy::Parallel
    } else {
        ranges.clear();
        TransferStrategy::Single
    };

    TransferPlan {
        url: url.to_string(),
        total_size,
        accepts_ranges,
        strategy,
        ranges,
    }
}

/// Split `total` bytes into `min(max_workers, total / min_chunk)` ranges
///
/// Every range but the last has the same length; the last absorbs the
/// remainder. Returns an empty list for an empty resource.
pub fn split_ranges(total: u64, max_workers: usize, min_chunk_size: u64) -> Vec<ByteRange> {
    if total == 0 {
        return Vec::new();
    }

    let by_size = total / min_chunk_size.max(1);
    let count = by_size.min(max_workers.max(1) as u64).max(1);
    let chunk = total / count;

    (0..count)
        .map(|i| {
            let start = i * chunk;
            let end = if i == count - 1 {
                total - 1
            } else {
                start + chunk - 1
            };
            ByteRange::new(start, end)
        })
        .collect()
}
