//! HTTP client for the upstream Hacker News feed.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use hnmirror_core::{Category, Item};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const CRATE_NAME: &str = "hnmirror-feed";

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "hnmirror/0.1";

/// Failure talking to the upstream source: network error, timeout, bad
/// status, or a body that is not the expected JSON. Calls are single-shot;
/// retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// The upstream feed as the sync engine sees it. [`FeedClient`] is the
/// production implementation; tests script their own.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Current id listing for a category, upstream order preserved.
    async fn category_ids(&self, category: Category) -> Result<Vec<u64>, TransportError>;

    /// Full body for one item. Upstream legitimately answers `null` for
    /// deleted or not-yet-assigned ids; that decodes to `Ok(None)` and the
    /// caller skips it.
    async fn item(&self, id: u64) -> Result<Option<Item>, TransportError>;
}

#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(config: FeedClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, TransportError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| TransportError::Decode { url, source })
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn category_ids(&self, category: Category) -> Result<Vec<u64>, TransportError> {
        let url = format!("{}/{}.json", self.base_url, category.listing_endpoint());
        self.get_json(url).await
    }

    async fn item(&self, id: u64) -> Result<Option<Item>, TransportError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        self.get_json(url).await
    }
}
