//! Progress aggregation and reporting
//!
//! [`ProgressTracker`] is the single synchronization point every chunk worker
//! writes through. [`ProgressReporter`] samples it on a fixed interval and on
//! every status change, forwarding a snapshot to a [`ProgressSink`] only when the
//! percentage or the status changed, so report frequency is independent of
//! worker count.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::app::models::{ProgressState, TransferStatus};

/// Receiver of progress snapshots
///
/// Called from the reporting task; implementations should return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressState);
}

/// Sink that drops every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _snapshot: &ProgressState) {}
}

impl ProgressSink for watch::Sender<ProgressState> {
    fn on_progress(&self, snapshot: &ProgressState) {
        self.send_replace(snapshot.clone());
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn on_progress(&self, snapshot: &ProgressState) {
        (**self).on_progress(snapshot);
    }
}

/// Forwards each snapshot to several sinks in order
#[derive(Default, Clone)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanOutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for FanOutSink {
    fn on_progress(&self, snapshot: &ProgressState) {
        for sink in &self.sinks {
            sink.on_progress(snapshot);
        }
    }
}

/// Shared, mutex-guarded progress accumulator
///
/// Status changes are also queued as transitions, so the reporter delivers
/// every status a transfer passes through even when it lasts less than one
/// sampling interval.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    state: Arc<Mutex<Shared>>,
    changed: Arc<Notify>,
}

#[derive(Debug)]
struct Shared {
    current: ProgressState,
    transitions: Vec<ProgressState>,
}

impl Shared {
    fn record_transition(&mut self) {
        self.transitions.push(self.current.clone());
    }
}

impl ProgressTracker {
    /// Tracker in `pending` state for a target
    pub fn new(initial: ProgressState) -> Self {
        Self {
            state: Arc::new(Mutex::new(Shared {
                current: initial,
                transitions: Vec::new(),
            })),
            changed: Arc::new(Notify::new()),
        }
    }

    /// Record the declared total once metadata is known
    pub async fn set_total(&self, total_size: u64) {
        let mut shared = self.state.lock().await;
        let state = &mut shared.current;
        state.total_size = total_size;
        state.percentage = ProgressState::compute_percentage(state.downloaded, total_size);
    }

    /// Add freshly written bytes; the count never decreases
    pub async fn add_bytes(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let mut shared = self.state.lock().await;
        let state = &mut shared.current;
        state.downloaded = state.downloaded.saturating_add(bytes);
        let pct = ProgressState::compute_percentage(state.downloaded, state.total_size);
        state.percentage = state.percentage.max(pct);
    }

    /// Move to a new status
    pub async fn set_status(&self, status: TransferStatus) {
        self.transition(|state| state.status = status).await;
    }

    /// Mark success at 100%
    pub async fn complete(&self) {
        self.transition(|state| {
            if state.total_size == 0 {
                state.total_size = state.downloaded;
            }
            state.percentage = 100;
            state.status = TransferStatus::Completed;
            state.error_message = None;
        })
        .await;
    }

    /// Mark a target that was already present as complete at `size` bytes
    pub async fn complete_existing(&self, size: u64) {
        self.transition(|state| {
            state.total_size = size;
            state.downloaded = size;
            state.percentage = 100;
            state.status = TransferStatus::Completed;
        })
        .await;
    }

    /// Mark failure with a message
    pub async fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.transition(|state| {
            state.status = TransferStatus::Error;
            state.error_message = Some(message);
        })
        .await;
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> ProgressState {
        self.state.lock().await.current.clone()
    }

    async fn transition(&self, update: impl FnOnce(&mut ProgressState)) {
        {
            let mut shared = self.state.lock().await;
            update(&mut shared.current);
            shared.record_transition();
        }
        self.changed.notify_one();
    }

    /// Queued transitions followed by the current state, taken atomically
    async fn drain(&self) -> (Vec<ProgressState>, ProgressState) {
        let mut shared = self.state.lock().await;
        let transitions = std::mem::take(&mut shared.transitions);
        (transitions, shared.current.clone())
    }
}

/// Periodic sampler that pushes changed snapshots to a sink
pub struct ProgressReporter {
    tracker: ProgressTracker,
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(tracker: ProgressTracker, sink: Arc<dyn ProgressSink>, interval: Duration) -> Self {
        Self {
            tracker,
            sink,
            interval,
        }
    }

    /// Start the reporting task
    ///
    /// The task samples on every tick and on every status change until
    /// `shutdown` fires (or its sender is dropped), then takes one last
    /// sample so the terminal state is always delivered.
    pub fn start(self, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let changed = self.tracker.changed.clone();
            let mut last: Option<(u8, TransferStatus)> = None;

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        debug!("Progress reporter received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sample(&mut last).await;
                    }
                    _ = changed.notified() => {
                        self.sample(&mut last).await;
                    }
                }
            }

            self.sample(&mut last).await;
        })
    }

    async fn sample(&self, last: &mut Option<(u8, TransferStatus)>) {
        let (transitions, current) = self.tracker.drain().await;
        for snapshot in transitions.iter().chain(std::iter::once(&current)) {
            self.emit(snapshot, last);
        }
    }

    fn emit(&self, snapshot: &ProgressState, last: &mut Option<(u8, TransferStatus)>) {
        let key = (snapshot.percentage, snapshot.status);
        if *last == Some(key) {
            return;
        }
        *last = Some(key);

        if snapshot.status == TransferStatus::Downloading {
            info!(
                "{}: {}% ({} / {})",
                snapshot.filename,
                snapshot.percentage,
                format_bytes(snapshot.downloaded),
                format_total(snapshot.total_size)
            );
        } else {
            debug!("{}: {}", snapshot.filename, snapshot.status);
        }
        self.sink.on_progress(snapshot);
    }
}

fn format_total(total: u64) -> String {
    if total == 0 {
        "unknown".to_string()
    } else {
        format_bytes(total)
    }
}

/// Human-readable byte count (binary units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
