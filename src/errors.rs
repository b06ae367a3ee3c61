//! Error types for parafetch
//!
//! Errors follow the transfer lifecycle: classification, preflight, transfer
//! (transient or fatal), archive handling and configuration. Every terminal
//! error is eventually folded into a failed `TransferOutcome`, so these types
//! describe *why* a transfer failed rather than interrupting the caller.

use std::path::PathBuf;
use thiserror::Error;

/// URL classification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Input could not be parsed as a URL at all
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// URL scheme is not http or https
    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    /// URL parsed but does not match any known resource shape
    #[error("Unable to classify URL {url}: {reason}")]
    Unrecognized { url: String, reason: String },
}

/// Disk preflight errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreflightError {
    /// Not enough free space for the transfer plus the safety margin
    #[error("Insufficient disk space. Required: {required} bytes, available: {available} bytes")]
    InsufficientSpace { required: u64, available: u64 },

    /// The check itself could not run (advisory only, never fails a transfer)
    #[error("Disk space check unavailable for {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },
}

/// Download and HTTP transfer errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No data received within the read timeout
    #[error("Download timed out after {seconds} seconds without data")]
    Timeout { seconds: u64 },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Origin answered a range request with the whole resource
    #[error("Server ignored range request for bytes {start}-{end} (HTTP {status})")]
    RangeNotHonored { start: u64, end: u64, status: u16 },

    /// Origin served a different byte range than requested
    #[error("Content-Range mismatch: requested {requested}, got {received}")]
    RangeMismatch { requested: String, received: String },

    /// Origin reports a different total size than the plan was built on
    #[error("Remote size changed during transfer. Planned: {planned} bytes, now: {reported} bytes")]
    SizeChanged { planned: u64, reported: u64 },

    /// Body ended before the expected number of bytes arrived
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// A chunk's temp file length differs from its declared range
    #[error("Chunk {index} size mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    ChunkSizeMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },

    /// Merged or streamed file length differs from the declared total
    #[error("File size mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded: {last_error}")]
    MaxRetriesExceeded { max_retries: u32, last_error: String },

    /// One chunk failed permanently, aborting the transfer
    #[error("Chunk {index} failed: {reason}")]
    ChunkFailed { index: usize, reason: String },

    /// Worker stopped because a sibling chunk failed
    #[error("Transfer aborted")]
    Aborted,

    /// Chunk task panicked or was cancelled by the runtime
    #[error("Chunk {index} task terminated unexpectedly: {reason}")]
    WorkerPanic { index: usize, reason: String },

    /// Invalid configuration supplied to the engine
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl DownloadError {
    /// Whether a chunk worker should retry after this error
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::Http(e) => {
                // Status errors surface through ServerError; anything else is a
                // connection, body or timeout failure.
                !e.is_builder() && !e.is_redirect()
            }
            DownloadError::Timeout { .. } | DownloadError::IncompleteDownload { .. } => true,
            DownloadError::ServerError { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Repository archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive is not a readable zip file
    #[error("Corrupted archive {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// I/O error while extracting
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extraction task panicked
    #[error("Archive extraction task failed: {0}")]
    TaskFailed(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Configuration serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Could not read or write the configuration file
    #[error("Configuration I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No platform configuration directory
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Classification error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Preflight error
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Archive error
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging and result records
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Resolve(_) => "classification",
            AppError::Preflight(_) => "preflight",
            AppError::Download(_) => "transfer",
            AppError::Archive(_) => "archive",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Resolver result type alias
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
