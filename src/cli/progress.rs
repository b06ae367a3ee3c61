//! Terminal progress display for transfers
//!
//! [`ProgressDisplay`] is a [`ProgressSink`] that drives an indicatif bar when
//! stderr is a terminal, and falls back to plain text lines otherwise. Text
//! mode prints on status changes and every `text_step_percent` points so
//! redirected logs stay short.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

use crate::app::progress::format_bytes;
use crate::app::{ProgressSink, ProgressState, TransferOutcome, TransferStatus};
use crate::constants::progress::BAR_REFRESH_HZ;
use crate::errors::{DownloadError, DownloadResult};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Show download rate in the bar
    pub show_download_rate: bool,
    /// Show ETA in the bar
    pub show_eta: bool,
    /// Maximum width for file names in display
    pub max_filename_width: usize,
    /// Percentage points between text-mode lines
    pub text_step_percent: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            show_download_rate: true,
            show_eta: true,
            max_filename_width: 40,
            text_step_percent: 10,
        }
    }
}

#[derive(Debug, Default)]
struct TextState {
    last_percentage: Option<u8>,
    last_status: Option<TransferStatus>,
}

/// Progress display manager for a single transfer
pub struct ProgressDisplay {
    config: ProgressConfig,
    bar: Option<ProgressBar>,
    text: Mutex<TextState>,
}

impl ProgressDisplay {
    /// Create a display, choosing bar or text mode from the terminal
    pub fn new(config: ProgressConfig) -> DownloadResult<Self> {
        let is_terminal = atty::is(atty::Stream::Stderr);
        Self::with_mode(config, is_terminal)
    }

    /// Create a display with an explicit mode
    pub fn with_mode(config: ProgressConfig, use_bar: bool) -> DownloadResult<Self> {
        let bar = if config.enable_progress_bars && use_bar {
            let bar = ProgressBar::with_draw_target(
                None,
                ProgressDrawTarget::stderr_with_hz(BAR_REFRESH_HZ),
            );
            bar.set_style(bar_style(&config)?);
            Some(bar)
        } else {
            None
        };

        Ok(Self {
            config,
            bar,
            text: Mutex::new(TextState::default()),
        })
    }

    /// Whether an indicatif bar is active
    pub fn is_bar_mode(&self) -> bool {
        self.bar.is_some()
    }

    /// Finish the display with the transfer's outcome
    pub fn finish(&self, outcome: &TransferOutcome) {
        debug!("Finishing progress display");

        let message = match (&outcome.path, outcome.success) {
            (Some(path), true) => format!("{}: {}", outcome.message, path.display()),
            _ => outcome.message.clone(),
        };

        match &self.bar {
            Some(bar) if outcome.success => bar.finish_with_message(message),
            Some(bar) => bar.abandon_with_message(message),
            None => eprintln!("{}", message),
        }
    }

    fn update_bar(&self, bar: &ProgressBar, snapshot: &ProgressState) {
        if snapshot.total_size > 0 && bar.length() != Some(snapshot.total_size) {
            bar.set_length(snapshot.total_size);
        }
        bar.set_position(snapshot.downloaded);

        let name = truncate_filename(&snapshot.filename, self.config.max_filename_width);
        match snapshot.status {
            TransferStatus::Extracting => bar.set_message(format!("{} (extracting)", name)),
            TransferStatus::Error => bar.set_message(format!(
                "{} failed: {}",
                name,
                snapshot.error_message.as_deref().unwrap_or("unknown error")
            )),
            _ => bar.set_message(name),
        }
    }

    fn update_text(&self, snapshot: &ProgressState) {
        let Ok(mut state) = self.text.lock() else {
            return;
        };

        let status_changed = state.last_status != Some(snapshot.status);
        let step = self.config.text_step_percent.max(1);
        let crossed_step = match state.last_percentage {
            None => true,
            Some(last) => snapshot.percentage / step > last / step,
        };

        if !status_changed && !crossed_step {
            return;
        }
        state.last_status = Some(snapshot.status);
        state.last_percentage = Some(snapshot.percentage);

        eprintln!("{}", text_line(snapshot, self.config.max_filename_width));
    }
}

impl ProgressSink for ProgressDisplay {
    fn on_progress(&self, snapshot: &ProgressState) {
        match &self.bar {
            Some(bar) => self.update_bar(bar, snapshot),
            None => self.update_text(snapshot),
        }
    }
}

fn bar_style(config: &ProgressConfig) -> DownloadResult<ProgressStyle> {
    let template = match (config.show_eta, config.show_download_rate) {
        (true, true) => "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {bytes_per_sec}",
        (true, false) => "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        (false, true) => "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}",
        (false, false) => "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
    };

    ProgressStyle::default_bar()
        .template(template)
        .map(|style| style.progress_chars("##-"))
        .map_err(|e| DownloadError::ConfigurationError(format!("Progress bar template error: {}", e)))
}

/// One plain-text progress line
fn text_line(snapshot: &ProgressState, width: usize) -> String {
    let name = truncate_filename(&snapshot.filename, width);
    match snapshot.status {
        TransferStatus::Downloading if snapshot.total_size > 0 => format!(
            "{}: {}% ({} of {})",
            name,
            snapshot.percentage,
            format_bytes(snapshot.downloaded),
            format_bytes(snapshot.total_size)
        ),
        TransferStatus::Downloading => {
            format!("{}: {} downloaded", name, format_bytes(snapshot.downloaded))
        }
        TransferStatus::Error => format!(
            "{}: error: {}",
            name,
            snapshot.error_message.as_deref().unwrap_or("unknown error")
        ),
        status => format!("{}: {}", name, status),
    }
}

/// Shorten `name` to `width` characters, keeping the end
fn truncate_filename(name: &str, width: usize) -> String {
    let count = name.chars().count();
    if count <= width || width <= 3 {
        return name.to_string();
    }
    let tail: String = name.chars().skip(count - (width - 3)).collect();
    format!("...{}", tail)
}
