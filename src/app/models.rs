//! Data models for parafetch
//!
//! Byte ranges, transfer plans and progress snapshots shared by the planner,
//! the chunk workers and the transfer engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::files;

/// An inclusive byte range `start..=end` of the remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Create a new inclusive range
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "range start must not exceed end");
        Self { start, end }
    }

    /// Number of bytes covered by the range
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges always cover at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Range` request header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Strategy chosen for a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStrategy {
    /// One sequential stream
    Single,
    /// Concurrent byte-range chunks
    Parallel,
}

impl fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// Metadata learned from probing the origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    /// Declared content length, 0 when the origin does not say
    pub total_size: u64,
    /// Whether the origin advertises `Accept-Ranges: bytes`
    pub accepts_ranges: bool,
}

impl RemoteMetadata {
    /// Metadata used when every metadata request fails
    pub fn conservative() -> Self {
        Self::default()
    }
}

/// The immutable plan a transfer executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPlan {
    /// Effective download URL
    pub url: String,
    /// Declared total size (0 = unknown)
    pub total_size: u64,
    /// Origin range support
    pub accepts_ranges: bool,
    /// Chosen strategy
    pub strategy: TransferStrategy,
    /// Chunk ranges, empty for single-stream plans
    pub ranges: Vec<ByteRange>,
}

impl TransferPlan {
    /// Whether the plan splits the transfer into chunks
    pub fn is_parallel(&self) -> bool {
        self.strategy == TransferStrategy::Parallel
    }

    /// Whether the origin declared a size to verify against
    pub fn size_known(&self) -> bool {
        self.total_size > 0
    }
}

/// Lifecycle status reported in progress snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Downloading,
    Extracting,
    Completed,
    Error,
}

impl TransferStatus {
    /// Whether no further updates will follow
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Snapshot of a transfer's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Declared total size (0 = unknown)
    pub total_size: u64,
    /// Bytes written so far
    pub downloaded: u64,
    /// floor(downloaded / total * 100), 0 while the total is unknown
    pub percentage: u8,
    /// Lifecycle status
    pub status: TransferStatus,
    /// Last error message, set when status is `error`
    pub error_message: Option<String>,
    /// Target filename
    pub filename: String,
    /// Target path
    pub destination: PathBuf,
}

impl ProgressState {
    /// Pending state for a target
    pub fn new(filename: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            total_size: 0,
            downloaded: 0,
            percentage: 0,
            status: TransferStatus::Pending,
            error_message: None,
            filename: filename.into(),
            destination: destination.into(),
        }
    }

    /// Floor percentage of `downloaded` over `total`, capped at 100
    pub fn compute_percentage(downloaded: u64, total: u64) -> u8 {
        if total == 0 {
            return 0;
        }
        let pct = (downloaded as u128 * 100) / total as u128;
        pct.min(100) as u8
    }
}

/// Pick the filename for a transfer before any network access
///
/// An explicit name wins; otherwise the percent-decoded last path segment of
/// the URL is used, falling back to `downloaded_file_<md5 prefix>`.
pub fn derive_filename(url: &str, explicit: Option<&str>) -> String {
    if let Some(name) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    url_basename(url).unwrap_or_else(|| fallback_filename(url))
}

fn url_basename(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let name = decoded.trim();

    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name.to_string())
}

fn fallback_filename(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    format!(
        "{}{}",
        files::FALLBACK_FILE_PREFIX,
        &digest[..files::FALLBACK_DIGEST_LEN]
    )
}
