//! Document fetching.
//!
//! A [`Source`] pairs a target address with the [`Fetch`] strategy selected
//! from its scheme. Pollers and the directory cache only ever see `Source`,
//! which keeps the transport swappable in tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("wireslack/", env!("CARGO_PKG_VERSION"));

/// Fetch the raw document behind a target address.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, target: &str) -> Result<String, FetchError>;
}

/// HTTP/S fetcher with a fixed per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<String, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Request {
            target: target.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(target).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                target: target.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(request_error)
    }
}

/// Reads a saved document from disk, for `file://` targets.
pub struct FileFetcher;

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self, target: &str) -> Result<String, FetchError> {
        let path = PathBuf::from(target.strip_prefix("file://").unwrap_or(target));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| FetchError::File { path, source })
    }
}

/// A target address bound to its fetch strategy.
#[derive(Clone)]
pub struct Source {
    url: String,
    fetcher: Arc<dyn Fetch>,
}

impl Source {
    /// Select the fetcher from the target's scheme.
    pub fn open(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let fetcher: Arc<dyn Fetch> = if url.starts_with("http://") || url.starts_with("https://")
        {
            Arc::new(HttpFetcher::new(timeout)?)
        } else if url.starts_with("file://") {
            Arc::new(FileFetcher)
        } else {
            return Err(FetchError::UnsupportedScheme {
                target: url.to_string(),
            });
        };
        Ok(Self::with_fetcher(url, fetcher))
    }

    pub fn with_fetcher(url: impl Into<String>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            url: url.into(),
            fetcher,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<String, FetchError> {
        self.fetcher.fetch(&self.url).await
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("url", &self.url).finish()
    }
}
