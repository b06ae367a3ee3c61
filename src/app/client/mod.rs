//! HTTP client wrapper
//!
//! Holds the shared `reqwest::Client` and attaches the optional bearer
//! credential to every request, including chunk requests.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use url::Url;

use crate::app::models::ByteRange;
use crate::errors::DownloadResult;

pub mod config;

pub use config::ClientConfig;

/// Bearer credential sent as `Authorization: Bearer <token>`
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token, ignoring blank input
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Raw token value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// HTTP client shared by the planner and all chunk workers
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the configuration is invalid or the TLS
    /// backend cannot be initialised
    pub fn new(config: ClientConfig) -> DownloadResult<Self> {
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Maximum silence between body reads
    pub fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    /// Metadata-only HEAD request
    pub fn head(&self, url: &Url, token: Option<&BearerToken>) -> RequestBuilder {
        let request = self
            .client
            .head(url.as_str())
            .timeout(self.config.metadata_timeout);
        Self::authorize(request, token)
    }

    /// Header-only GET used when HEAD is rejected
    pub fn metadata_get(&self, url: &Url, token: Option<&BearerToken>) -> RequestBuilder {
        let request = self
            .client
            .get(url.as_str())
            .timeout(self.config.metadata_timeout);
        Self::authorize(request, token)
    }

    /// Streaming GET, restricted to `range` when given
    pub fn get(
        &self,
        url: &Url,
        token: Option<&BearerToken>,
        range: Option<ByteRange>,
    ) -> RequestBuilder {
        let mut request = self.client.get(url.as_str());
        if let Some(range) = range {
            request = request.header(header::RANGE, range.header_value());
        }
        Self::authorize(request, token)
    }

    fn authorize(request: RequestBuilder, token: Option<&BearerToken>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }
}
