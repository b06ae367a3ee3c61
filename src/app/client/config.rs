//! HTTP client configuration and building logic

use std::time::Duration;

use reqwest::{redirect, Client};
use serde::{Deserialize, Serialize};

use crate::constants::http;
use crate::errors::{DownloadError, DownloadResult};

/// Configuration for the shared HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum silence between body reads
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Timeout for metadata requests
    #[serde(with = "humantime_serde")]
    pub metadata_timeout: Duration,
    /// User agent header value
    pub user_agent: String,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: http::CONNECT_TIMEOUT,
            read_timeout: http::READ_TIMEOUT,
            metadata_timeout: http::METADATA_TIMEOUT,
            user_agent: http::USER_AGENT.to_string(),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the metadata request timeout
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Validate timeouts and pool sizing
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be greater than 0".to_string());
        }
        if self.read_timeout.is_zero() {
            return Err("read_timeout must be greater than 0".to_string());
        }
        if self.metadata_timeout.is_zero() {
            return Err("metadata_timeout must be greater than 0".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }
        Ok(())
    }

    /// Builds the HTTP client with the specified configuration
    ///
    /// No overall request timeout is set: chunk bodies may stream for a long
    /// time, so stalls are caught by the per-read timeout instead.
    pub fn build_http_client(&self) -> DownloadResult<Client> {
        self.validate().map_err(DownloadError::ConfigurationError)?;

        Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(self.tcp_nodelay)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .pool_idle_timeout(Some(http::POOL_IDLE_TIMEOUT))
            .pool_max_idle_per_host(self.pool_max_per_host)
            .redirect(redirect::Policy::limited(http::MAX_REDIRECTS))
            .build()
            .map_err(DownloadError::Http)
    }
}
