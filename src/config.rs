//! Configuration management for parafetch
//!
//! Configuration is read from TOML. Search order: an explicit `--config` path
//! (which must exist), `./parafetch.toml`, then
//! `<user config dir>/parafetch/config.toml`. A missing file means defaults,
//! and every section or key may be omitted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, EngineConfig, PlanLimits, RetryPolicy};
use crate::constants::{config as paths, github, http, limits, logging, progress, transfer};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Transfer planning settings
    pub transfer: TransferConfigToml,
    /// Retry and backoff settings
    pub retry: RetryConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Connection establishment timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum silence between body reads
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Timeout for HEAD / header-only metadata requests
    #[serde(with = "humantime_serde")]
    pub metadata_timeout: Duration,
    /// User agent header
    pub user_agent: String,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            connect_timeout: http::CONNECT_TIMEOUT,
            read_timeout: http::READ_TIMEOUT,
            metadata_timeout: http::METADATA_TIMEOUT,
            user_agent: http::USER_AGENT.to_string(),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

/// TOML-friendly transfer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfigToml {
    /// Default destination directory
    pub destination: PathBuf,
    /// Ceiling on concurrent chunk workers
    pub max_workers: usize,
    /// Minimum chunk size in bytes, also the parallel threshold
    pub min_chunk_size: u64,
    /// Free space required on top of the transfer size (percent)
    pub disk_margin_percent: u64,
    /// Progress sampling interval
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    /// Branch used for repository archives
    pub archive_branch: String,
    /// Origin treated as github.com (for mirrors and enterprise hosts)
    pub github_origin: String,
    /// Unpack repository archives after download
    pub extract_archives: bool,
}

impl Default for TransferConfigToml {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("."),
            max_workers: transfer::DEFAULT_MAX_WORKERS,
            min_chunk_size: transfer::DEFAULT_MIN_CHUNK_SIZE,
            disk_margin_percent: transfer::DISK_SAFETY_MARGIN_PERCENT,
            progress_interval: progress::REPORT_INTERVAL,
            archive_branch: github::DEFAULT_ARCHIVE_BRANCH.to_string(),
            github_origin: github::WEB_ORIGIN.to_string(),
            extract_archives: true,
        }
    }
}

/// TOML-friendly retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfigToml {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Cap on a single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Growth factor between delays
    pub multiplier: f64,
}

impl Default for RetryConfigToml {
    fn default() -> Self {
        Self {
            max_retries: limits::MAX_RETRIES,
            base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(limits::MAX_BACKOFF_SECS),
            multiplier: limits::BACKOFF_MULTIPLIER,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            metadata_timeout: self.metadata_timeout,
            user_agent: self.user_agent.clone(),
            pool_max_per_host: self.pool_max_per_host,
            ..ClientConfig::default()
        }
    }
}

impl RetryConfigToml {
    /// Convert to runtime RetryPolicy
    pub fn to_runtime_config(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
        }
    }
}

impl TransferConfigToml {
    /// Planning limits for new requests
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            max_workers: self.max_workers,
            min_chunk_size: self.min_chunk_size,
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to the engine's runtime configuration
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            client: self.client.to_runtime_config(),
            retry: self.retry.to_runtime_config(),
            progress_interval: self.transfer.progress_interval,
            disk_margin_percent: self.transfer.disk_margin_percent,
            archive_branch: self.transfer.archive_branch.clone(),
            github_origin: self.transfer.github_origin.clone(),
        }
    }

    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, reason: String| ConfigError::InvalidValue {
            field: field.to_string(),
            value: String::new(),
            reason,
        };

        self.to_engine_config()
            .validate()
            .map_err(|reason| invalid("engine", reason))?;
        self.transfer
            .limits()
            .validate()
            .map_err(|reason| invalid("transfer", reason))?;

        if tracing_level(&self.logging.level).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: "expected one of error, warn, info, debug, trace".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from the first file found, or defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if `config_file_override` does not
    /// exist, or a parse/validation error for a malformed file
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Write a commented default configuration file
    ///
    /// Returns the path written. Existing files are kept unless `force`.
    pub async fn write_default(path: Option<PathBuf>, force: bool) -> ConfigResult<PathBuf> {
        let path = match path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if path.exists() && !force {
            info!("Configuration already exists at {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Created default configuration file {}", path.display());
        Ok(path)
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(paths::LOCAL_FILE_NAME)];
        if let Ok(user_path) = Self::default_config_path() {
            search_paths.push(user_path);
        }

        let found = search_paths.into_iter().find(|path| path.is_file());
        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(paths::APP_DIR_NAME).join(paths::FILE_NAME))
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration content with comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# parafetch configuration
# Every key is optional; removed keys fall back to the defaults shown here.

[client]
connect_timeout = "{connect}"
# Maximum silence between body reads before a stream counts as stalled
read_timeout = "{read}"
metadata_timeout = "{metadata}"
user_agent = "{agent}"
pool_max_per_host = {pool}

[transfer]
# Default destination directory
destination = "."
# Ceiling on concurrent chunk workers
max_workers = {workers}
# Files must exceed this size (bytes) to be split, and chunks are at least this big
min_chunk_size = {chunk}
# Extra free space required on top of the file size
disk_margin_percent = {margin}
progress_interval = "{interval}"
# Branch downloaded for whole-repository URLs
archive_branch = "{branch}"
# Origin treated as github.com, for mirrors and enterprise hosts
github_origin = "{origin}"
extract_archives = true

[retry]
# Retries per chunk after the first attempt
max_retries = {retries}
base_delay = "{base}"
max_delay = "{max_delay}"
multiplier = {multiplier:.1}

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            connect = humantime::format_duration(http::CONNECT_TIMEOUT),
            read = humantime::format_duration(http::READ_TIMEOUT),
            metadata = humantime::format_duration(http::METADATA_TIMEOUT),
            agent = http::USER_AGENT,
            pool = http::POOL_MAX_PER_HOST,
            workers = transfer::DEFAULT_MAX_WORKERS,
            chunk = transfer::DEFAULT_MIN_CHUNK_SIZE,
            margin = transfer::DISK_SAFETY_MARGIN_PERCENT,
            interval = humantime::format_duration(progress::REPORT_INTERVAL),
            branch = github::DEFAULT_ARCHIVE_BRANCH,
            origin = github::WEB_ORIGIN,
            retries = limits::MAX_RETRIES,
            base = humantime::format_duration(Duration::from_millis(limits::RETRY_BASE_DELAY_MS)),
            max_delay = humantime::format_duration(Duration::from_secs(limits::MAX_BACKOFF_SECS)),
            multiplier = limits::BACKOFF_MULTIPLIER,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

/// Map a configured level name to a tracing level
pub fn tracing_level(level: &str) -> Option<tracing::Level> {
    level.trim().parse::<tracing::Level>().ok()
}
