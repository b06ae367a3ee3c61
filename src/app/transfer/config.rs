//! Transfer engine configuration

use std::time::Duration;

use crate::app::client::ClientConfig;
use crate::app::worker::RetryPolicy;
use crate::constants::{github, progress, transfer};

/// Settings shared by every transfer an engine runs
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// HTTP client settings
    pub client: ClientConfig,
    /// Retry settings for chunk and stream workers
    pub retry: RetryPolicy,
    /// Sampling interval of the progress reporter
    pub progress_interval: Duration,
    /// Free space required on top of the transfer size (percent)
    pub disk_margin_percent: u64,
    /// Branch used for repository archive URLs
    pub archive_branch: String,
    /// Origin serving GitHub web URLs and repository archives
    pub github_origin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            retry: RetryPolicy::default(),
            progress_interval: progress::REPORT_INTERVAL,
            disk_margin_percent: transfer::DISK_SAFETY_MARGIN_PERCENT,
            archive_branch: github::DEFAULT_ARCHIVE_BRANCH.to_string(),
            github_origin: github::WEB_ORIGIN.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_disk_margin_percent(mut self, percent: u64) -> Self {
        self.disk_margin_percent = percent;
        self
    }

    pub fn with_archive_branch(mut self, branch: impl Into<String>) -> Self {
        self.archive_branch = branch.into();
        self
    }

    pub fn with_github_origin(mut self, origin: impl Into<String>) -> Self {
        self.github_origin = origin.into();
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.client.validate()?;
        self.retry.validate()?;
        if self.progress_interval.is_zero() {
            return Err("progress_interval must be greater than 0".to_string());
        }
        if self.archive_branch.trim().is_empty() {
            return Err("archive_branch must not be empty".to_string());
        }
        if self.github_origin.trim().is_empty() {
            return Err("github_origin must not be empty".to_string());
        }
        Ok(())
    }
}
