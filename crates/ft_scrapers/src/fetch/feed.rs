use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::info;

use ft_core::{CandidateArticle, Error, Result, Source};

use crate::rate_limit::RateLimiter;

/// Most-recent entries taken per feed, to bound work per run.
pub const MAX_ENTRIES_PER_SOURCE: usize = 15;

/// Fetches RSS/Atom feed sources.
pub struct FeedFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl FeedFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }
}

#[async_trait]
impl super::Fetcher for FeedFetcher {
    fn name(&self) -> &str {
        "feed"
    }

    fn can_handle(&self, source: &Source) -> bool {
        source.is_feed()
    }

    async fn fetch(&self, source: &Source) -> Result<Vec<CandidateArticle>> {
        let feed_url = source
            .feed_url
            .as_deref()
            .ok_or_else(|| Error::Fetch(format!("Source {} has no feed URL", source.name)))?;

        let response = super::get_with_retry(&self.client, &self.limiter, feed_url).await?;
        let bytes = response.error_for_status()?.bytes().await?;
        let articles = parse_feed(&source.id, &bytes)?;
        info!(source = %source.name, entries = articles.len(), "📰 Feed fetched");
        Ok(articles)
    }
}

/// Parse a feed document into candidate articles, newest first, capped at
/// `MAX_ENTRIES_PER_SOURCE`.
pub fn parse_feed(source_id: &str, bytes: &[u8]) -> Result<Vec<CandidateArticle>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| Error::Fetch(format!("Feed parse error: {}", e)))?;

    let mut articles: Vec<CandidateArticle> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone())?;
            Some(CandidateArticle {
                source_id: source_id.to_string(),
                url,
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                summary: entry.summary.map(|s| s.content),
                published_at: entry.published.or(entry.updated),
                discovered_at: Utc::now(),
            })
        })
        .collect();

    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    articles.truncate(MAX_ENTRIES_PER_SOURCE);
    Ok(articles)
}
