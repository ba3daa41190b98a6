use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use ft_core::{CandidateArticle, Result, Source};

use crate::rate_limit::RateLimiter;

/// Query terms used when a search source does not carry its own.
pub const DEFAULT_QUERIES: &[&str] = &[
    "startup funding announcement india",
    "startup raises seed round",
    "series A funding startup",
];

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Maximum results kept per query term.
pub const MAX_RESULTS_PER_QUERY: usize = 10;

/// Discovers articles through a web search engine instead of a feed.
pub struct SearchFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    endpoint: String,
}

impl SearchFetcher {
    pub fn new(client: Client, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            limiter,
            endpoint: SEARCH_ENDPOINT.to_string(),
        }
    }

    /// Point searches at a different endpoint. Tests use this to serve
    /// canned result pages from a local listener.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl super::Fetcher for SearchFetcher {
    fn name(&self) -> &str {
        "search"
    }

    fn can_handle(&self, source: &Source) -> bool {
        !source.is_feed()
    }

    async fn fetch(&self, source: &Source) -> Result<Vec<CandidateArticle>> {
        let terms: Vec<String> = if source.queries.is_empty() {
            DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect()
        } else {
            source.queries.clone()
        };

        let mut articles = Vec::new();
        let mut seen = HashSet::new();
        for term in &terms {
            let query_url = Url::parse_with_params(&self.endpoint, [("q", term.as_str())])
                .map_err(|e| ft_core::Error::InvalidUrl(e.to_string()))?;
            let response =
                match super::get_with_retry(&self.client, &self.limiter, query_url.as_str()).await
                {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(source = %source.name, term, error = %e, "Search request failed");
                        continue;
                    }
                };
            if !response.status().is_success() {
                warn!(source = %source.name, term, status = %response.status(), "Search returned error status");
                continue;
            }
            let html = match response.text().await {
                Ok(html) => html,
                Err(e) => {
                    warn!(source = %source.name, term, error = %e, "Search body read failed");
                    continue;
                }
            };
            for article in parse_results(&source.id, &html) {
                if seen.insert(article.url.clone()) {
                    articles.push(article);
                }
            }
        }
        info!(source = %source.name, results = articles.len(), "🔎 Search fetched");
        Ok(articles)
    }
}

/// Parse a search results page into candidate articles. Keeps at most
/// `MAX_RESULTS_PER_QUERY` results and drops any hit without a link.
pub fn parse_results(source_id: &str, html: &str) -> Vec<CandidateArticle> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".result").unwrap();
    let link_sel = Selector::parse("a.result__a").unwrap();
    let snippet_sel = Selector::parse(".result__snippet").unwrap();

    let mut articles = Vec::new();
    for result in document.select(&result_sel) {
        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title: String = link.text().collect::<String>().trim().to_string();
        let summary = result
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        articles.push(CandidateArticle {
            source_id: source_id.to_string(),
            url: href.to_string(),
            title,
            summary,
            published_at: None,
            discovered_at: Utc::now(),
        });
        if articles.len() >= MAX_RESULTS_PER_QUERY {
            break;
        }
    }
    articles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results_page(count: usize) -> String {
        let results: String = (0..count)
            .map(|i| {
                format!(
                    "<div class=\"result\">\
                     <a class=\"result__a\" href=\"https://news.example.com/item-{i}\">Headline {i}</a>\
                     <div class=\"result__snippet\">Snippet text for item {i}.</div>\
                     </div>"
                )
            })
            .collect();
        format!("<html><body><div class=\"results\">{results}</div></body></html>")
    }

    #[test]
    fn parses_links_titles_and_snippets() {
        let articles = parse_results("src-1", &results_page(3));
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].url, "https://news.example.com/item-0");
        assert_eq!(articles[0].title, "Headline 0");
        assert_eq!(articles[0].summary.as_deref(), Some("Snippet text for item 0."));
    }

    #[test]
    fn caps_results_per_query() {
        let articles = parse_results("src-1", &results_page(25));
        assert_eq!(articles.len(), MAX_RESULTS_PER_QUERY);
    }

    #[tokio::test]
    async fn truncated_body_skips_the_term_and_continues() {
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];

            // first term: declared length never arrives, body read fails
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\n\
                      Connection: close\r\n\r\ntruncated",
                )
                .await;
            drop(sock);

            // second term: complete results page
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ = sock.read(&mut buf).await;
            let body = results_page(2);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = sock.write_all(response.as_bytes()).await;
        });

        let fetcher = SearchFetcher::new(
            crate::fetch::http_client(),
            Arc::new(RateLimiter::new(Duration::ZERO)),
        )
        .with_endpoint(&format!("http://{addr}/"));
        let source = ft_core::Source::search(
            "Local Search",
            "https://example.com",
            &["term one", "term two"],
            &[],
        );

        let articles = crate::fetch::Fetcher::fetch(&fetcher, &source).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://news.example.com/item-0");
    }

    #[test]
    fn skips_results_without_links() {
        let html = "<div class=\"result\">\
                    <div class=\"result__snippet\">No link here.</div></div>\
                    <div class=\"result\">\
                    <a class=\"result__a\" href=\"https://news.example.com/ok\">Ok</a></div>";
        let articles = parse_results("src-1", html);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://news.example.com/ok");
    }
}
