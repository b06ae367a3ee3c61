//! Shared helpers for integration tests
//!
//! Range-aware wiremock responders and a collecting progress sink.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::{Request, Respond, ResponseTemplate};

use parafetch::app::{EngineConfig, ProgressSink, ProgressState, RetryPolicy, TransferEngine};

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Engine settings with short retry delays and fast progress sampling
pub fn test_config() -> EngineConfig {
    let retry = RetryPolicy::default()
        .with_max_retries(3)
        .with_base_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(50));
    EngineConfig::default()
        .with_retry(retry)
        .with_progress_interval(Duration::from_millis(10))
}

/// Engine built from [`test_config`]
pub fn test_engine() -> TransferEngine {
    engine_with(test_config())
}

pub fn engine_with(config: EngineConfig) -> TransferEngine {
    TransferEngine::new(config).expect("Failed to create engine")
}

/// Parse `bytes=start-end` from a request
pub fn requested_range(request: &Request) -> Option<(u64, u64)> {
    let value = request.headers.get("range")?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Serves `body` honoring single byte ranges
#[derive(Clone)]
pub struct RangeResponder {
    body: Arc<Vec<u8>>,
    /// Total advertised in Content-Range, when it should differ from the body
    reported_total: Option<u64>,
}

impl RangeResponder {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            reported_total: None,
        }
    }

    /// Advertise a different total in Content-Range
    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let total = self.body.len() as u64;
        let Some((start, end)) = requested_range(request) else {
            return ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .set_body_bytes(self.body.as_slice().to_vec());
        };

        if start > end || end >= total {
            return ResponseTemplate::new(416)
                .insert_header("Content-Range", format!("bytes */{}", total));
        }

        let slice = self.body[start as usize..=end as usize].to_vec();
        ResponseTemplate::new(206)
            .insert_header("Accept-Ranges", "bytes")
            .insert_header(
                "Content-Range",
                format!(
                    "bytes {}-{}/{}",
                    start,
                    end,
                    self.reported_total.unwrap_or(total)
                ),
            )
            .set_body_bytes(slice)
    }
}

/// Returns 503 for the first `failures` requests, then delegates
pub struct FlakyResponder {
    inner: RangeResponder,
    failures: usize,
    seen: AtomicUsize,
}

impl FlakyResponder {
    pub fn new(inner: RangeResponder, failures: usize) -> Self {
        Self {
            inner,
            failures,
            seen: AtomicUsize::new(0),
        }
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            return ResponseTemplate::new(503);
        }
        self.inner.respond(request)
    }
}

/// Returns `status` for the range starting at `fail_start`
pub struct FailingRangeResponder {
    inner: RangeResponder,
    fail_start: u64,
    status: u16,
}

impl FailingRangeResponder {
    pub fn new(inner: RangeResponder, fail_start: u64, status: u16) -> Self {
        Self {
            inner,
            fail_start,
            status,
        }
    }
}

impl Respond for FailingRangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match requested_range(request) {
            Some((start, _)) if start == self.fail_start => ResponseTemplate::new(self.status),
            _ => self.inner.respond(request),
        }
    }
}

/// Delays the first `stalls` responses by `delay`, then delegates
pub struct StallingResponder {
    inner: RangeResponder,
    stalls: usize,
    delay: Duration,
    seen: AtomicUsize,
}

impl StallingResponder {
    pub fn new(inner: RangeResponder, stalls: usize, delay: Duration) -> Self {
        Self {
            inner,
            stalls,
            delay,
            seen: AtomicUsize::new(0),
        }
    }
}

impl Respond for StallingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let response = self.inner.respond(request);
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.stalls {
            return response.set_delay(self.delay);
        }
        response
    }
}

/// Cuts the body of the first ranged response in half, then delegates
pub struct TruncateOnceResponder {
    inner: RangeResponder,
    truncated: AtomicUsize,
}

impl TruncateOnceResponder {
    pub fn new(inner: RangeResponder) -> Self {
        Self {
            inner,
            truncated: AtomicUsize::new(0),
        }
    }
}

impl Respond for TruncateOnceResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some((start, end)) = requested_range(request) else {
            return self.inner.respond(request);
        };
        if self.truncated.fetch_add(1, Ordering::SeqCst) > 0 {
            return self.inner.respond(request);
        }
        let half = start + (end - start) / 2;
        let slice = self.inner.body[start as usize..half as usize].to_vec();
        ResponseTemplate::new(206)
            .insert_header(
                "Content-Range",
                format!("bytes {}-{}/{}", start, end, self.inner.body.len()),
            )
            .set_body_bytes(slice)
    }
}

/// Records every snapshot it receives
#[derive(Default)]
pub struct CollectingSink {
    snapshots: Mutex<Vec<ProgressState>>,
}

impl CollectingSink {
    pub fn snapshots(&self) -> Vec<ProgressState> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn on_progress(&self, snapshot: &ProgressState) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}
