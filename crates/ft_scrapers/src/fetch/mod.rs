use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use ft_core::{CandidateArticle, Result, Source};

use crate::rate_limit::RateLimiter;

pub mod feed;
pub mod search;

pub use feed::FeedFetcher;
pub use search::SearchFetcher;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Shared HTTP client. The gzip/brotli/deflate crate features make reqwest
/// decode whatever content-encoding the server declares, so a compressed
/// response never reads as garbage downstream.
pub fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Retrieves raw candidate articles for one source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, source: &Source) -> bool;

    async fn fetch(&self, source: &Source) -> Result<Vec<CandidateArticle>>;
}

/// Retrieves one article page as HTML. A seam so the pipeline can be tested
/// without the network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl HttpPageFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        let response = get_with_retry(&self.client, &self.limiter, url).await?;
        Ok(response.error_for_status()?.text().await?)
    }
}

/// GET with per-origin rate limiting and a single retry after backoff on
/// transient network errors (connect failures, timeouts).
pub async fn get_with_retry(
    client: &Client,
    limiter: &RateLimiter,
    url: &str,
) -> Result<reqwest::Response> {
    limiter.wait(url).await;
    match client.get(url).send().await {
        Ok(response) => Ok(response),
        Err(e) if e.is_timeout() || e.is_connect() => {
            warn!(url, error = %e, "Transient fetch error, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            limiter.wait(url).await;
            Ok(client.get(url).send().await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Pick the fetcher responsible for a source.
pub fn fetcher_for<'a>(
    fetchers: &'a [Arc<dyn Fetcher>],
    source: &Source,
) -> Option<&'a Arc<dyn Fetcher>> {
    fetchers.iter().find(|f| f.can_handle(source))
}
