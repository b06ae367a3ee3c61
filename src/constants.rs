//! Application constants for parafetch
//!
//! Defaults for every tunable live here, grouped by the component that owns
//! them. Runtime configuration overrides most of these values.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Bearer token used when no `--token` is given
    pub const TOKEN: &str = "PARAFETCH_TOKEN";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("parafetch/", env!("CARGO_PKG_VERSION"));

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum silence between body reads before a stream counts as stalled
    pub const READ_TIMEOUT: Duration = Duration::from_secs(120);

    /// Timeout for the metadata request (HEAD or header-only GET)
    pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 32;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;

    /// Value of `Accept-Ranges` that signals byte-range support
    pub const RANGE_UNIT_BYTES: &str = "bytes";
}

/// Retry and backoff configuration
pub mod limits {
    /// Retries after the first failed attempt of a chunk
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Upper bound on a single backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 30;

    /// Growth factor between consecutive delays
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
}

/// Transfer planning and preflight
pub mod transfer {
    /// Default ceiling on concurrent chunk workers
    pub const DEFAULT_MAX_WORKERS: usize = 8;

    /// Hard upper bound accepted for the worker ceiling
    pub const MAX_WORKER_LIMIT: usize = 32;

    /// Default minimum chunk size; also the parallel threshold (bytes)
    pub const DEFAULT_MIN_CHUNK_SIZE: u64 = 10_000_000;

    /// Free space required on top of the transfer size (percent)
    pub const DISK_SAFETY_MARGIN_PERCENT: u64 = 10;
}

/// File operation constants
pub mod files {
    /// Staging suffix for single-stream and merged output
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Prefix of the per-transfer chunk directory
    pub const CHUNK_DIR_PREFIX: &str = ".tmp_";

    /// Prefix of each chunk file inside the chunk directory
    pub const CHUNK_FILE_PREFIX: &str = "part_";

    /// Prefix of the name used when a URL has no usable basename
    pub const FALLBACK_FILE_PREFIX: &str = "downloaded_file_";

    /// Hex digits of the URL digest kept in the fallback name
    pub const FALLBACK_DIGEST_LEN: usize = 8;

    /// Buffer size for the chunk merge copy (256KB)
    pub const MERGE_BUFFER_SIZE: usize = 256 * 1024;
}

/// Progress reporting
pub mod progress {
    use super::Duration;

    /// Sampling interval of the reporting loop
    pub const REPORT_INTERVAL: Duration = Duration::from_millis(500);

    /// Refresh rate of the terminal progress bar (Hz)
    pub const BAR_REFRESH_HZ: u8 = 10;
}

/// GitHub URL shapes
pub mod github {
    /// Hosts treated as github.com
    pub const WEB_HOSTS: &[&str] = &["github.com", "www.github.com"];

    /// Origin used to build repository archive URLs
    pub const WEB_ORIGIN: &str = "https://github.com";

    /// Raw-content host
    pub const RAW_HOST: &str = "raw.githubusercontent.com";

    /// Branch used for whole-repository archive URLs
    pub const DEFAULT_ARCHIVE_BRANCH: &str = "main";

    /// Extracted directory suffixes checked before re-downloading a repository
    pub const KNOWN_BRANCH_DIRS: &[&str] = &["main", "master"];
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Configuration file locations
pub mod config {
    /// File name searched in the working directory
    pub const LOCAL_FILE_NAME: &str = "parafetch.toml";

    /// Directory under the platform config dir
    pub const APP_DIR_NAME: &str = "parafetch";

    /// File name inside the app config dir
    pub const FILE_NAME: &str = "config.toml";
}

pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use limits::{MAX_RETRIES, RETRY_BASE_DELAY_MS};
pub use transfer::{DEFAULT_MAX_WORKERS, DEFAULT_MIN_CHUNK_SIZE};
