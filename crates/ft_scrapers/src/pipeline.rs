//! Run orchestration: fans active sources out over a bounded worker pool,
//! walks each source's candidate articles through dedup, content extraction
//! and the AI engine, and appends exactly one run-log entry per source.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use ft_core::{
    dedup, CandidateArticle, DedupStore, ExtractedContent, ExtractionOutcome, ProviderTag,
    RunLogEntry, RunLogStore, RunStatus, Source, SourceRegistry, StartupCandidate, StartupRecord,
    StartupStore, Storage,
};
use ft_inference::ExtractionEngine;

use crate::content;
use crate::fetch::{self, Fetcher, HttpPageFetcher, PageFetcher};
use crate::rate_limit::RateLimiter;

/// Sources processed concurrently per run. Articles within a source stay
/// sequential so per-origin politeness holds.
pub const MAX_CONCURRENT_SOURCES: usize = 4;

/// Minimum spacing between requests to the same origin.
pub const MIN_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Aggregate counters for one `run_all` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub sources_run: usize,
    pub sources_skipped: usize,
    pub articles_processed: u64,
    pub startups_found: u64,
}

pub struct PipelineManager {
    storage: Arc<dyn Storage>,
    engine: Arc<ExtractionEngine>,
    fetchers: Vec<Arc<dyn Fetcher>>,
    pages: Arc<dyn PageFetcher>,
    semaphore: Semaphore,
    in_flight: StdMutex<HashSet<String>>,
    cancelled: AtomicBool,
}

impl PipelineManager {
    pub fn new(storage: Arc<dyn Storage>, engine: Arc<ExtractionEngine>) -> Arc<Self> {
        let client = fetch::http_client();
        let limiter = Arc::new(RateLimiter::new(MIN_REQUEST_DELAY));
        let fetchers: Vec<Arc<dyn Fetcher>> = vec![
            Arc::new(fetch::FeedFetcher::new(client.clone(), limiter.clone())),
            Arc::new(fetch::SearchFetcher::new(client.clone(), limiter.clone())),
        ];
        let pages = Arc::new(HttpPageFetcher::new(client, limiter));
        Self::with_parts(storage, engine, fetchers, pages)
    }

    /// Assemble a pipeline from explicit parts. Tests inject mock fetchers
    /// and page fetchers here to run entirely offline.
    pub fn with_parts(
        storage: Arc<dyn Storage>,
        engine: Arc<ExtractionEngine>,
        fetchers: Vec<Arc<dyn Fetcher>>,
        pages: Arc<dyn PageFetcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            engine,
            fetchers,
            pages,
            semaphore: Semaphore::new(MAX_CONCURRENT_SOURCES),
            in_flight: StdMutex::new(HashSet::new()),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Request cancellation. Sources not yet started are skipped; the
    /// article loop stops between articles. In-flight provider calls run to
    /// completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Spawn a full run in the background. Used by the interval scheduler
    /// and the manual trigger endpoint.
    pub fn spawn_run(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_all().await;
        });
    }

    /// Process every active source once.
    pub async fn run_all(self: &Arc<Self>) -> RunSummary {
        self.cancelled.store(false, Ordering::SeqCst);
        let sources = match self.storage.list_active_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                error!(error = %e, "Could not list sources, aborting run");
                return RunSummary::default();
            }
        };
        info!(sources = sources.len(), "🚀 Starting discovery run");

        let mut handles = Vec::new();
        for source in sources {
            if self.is_cancelled() {
                info!("Run cancelled, remaining sources skipped");
                break;
            }
            if !self.claim_source(&source.id) {
                info!(source = %source.name, "Source already running, skipped");
                handles.push(tokio::spawn(async { None::<RunLogEntry> }));
                continue;
            }
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                // Claim released in run_source on every path.
                let permit = this.semaphore.acquire().await.ok()?;
                let entry = this.run_claimed_source(&source).await;
                drop(permit);
                Some(entry)
            }));
        }

        let mut summary = RunSummary::default();
        for handle in handles {
            match handle.await {
                Ok(Some(entry)) => {
                    summary.sources_run += 1;
                    summary.articles_processed += u64::from(entry.articles_processed);
                    summary.startups_found += u64::from(entry.startups_found);
                }
                Ok(None) => summary.sources_skipped += 1,
                Err(e) => error!(error = %e, "Source worker panicked"),
            }
        }
        info!(
            sources = summary.sources_run,
            articles = summary.articles_processed,
            startups = summary.startups_found,
            "✅ Discovery run finished"
        );
        summary
    }

    /// Process one source end to end, including the run-log append.
    /// Skips (returning `None`) when the source is already in flight.
    pub async fn run_source(self: &Arc<Self>, source: &Source) -> Option<RunLogEntry> {
        if !self.claim_source(&source.id) {
            return None;
        }
        Some(self.run_claimed_source(source).await)
    }

    async fn run_claimed_source(&self, source: &Source) -> RunLogEntry {
        let entry = self.process_source(source).await;
        self.release_source(&source.id);
        if let Err(e) = self.storage.append(&entry).await {
            error!(source = %source.name, error = %e, "Could not append run log entry");
        }
        entry
    }

    async fn process_source(&self, source: &Source) -> RunLogEntry {
        let Some(fetcher) = fetch::fetcher_for(&self.fetchers, source) else {
            let mut entry = RunLogEntry::new(&source.id, RunStatus::Failure, ProviderTag::None);
            entry.error_message = Some("No fetcher handles this source".to_string());
            return entry;
        };

        let candidates = match fetcher.fetch(source).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(source = %source.name, error = %e, "Source unreachable");
                let mut entry =
                    RunLogEntry::new(&source.id, RunStatus::Failure, ProviderTag::None);
                entry.error_message = Some(e.to_string());
                return entry;
            }
        };

        let mut processed: u32 = 0;
        let mut found: u32 = 0;
        let mut success_tag: Option<ProviderTag> = None;
        let mut any_failed = false;
        let mut last_error: Option<String> = None;

        for candidate in &candidates {
            if self.is_cancelled() {
                info!(source = %source.name, "Run cancelled mid-source");
                break;
            }
            processed += 1;
            match self.process_candidate(source, candidate).await {
                Ok(Some((outcome_tag, created))) => {
                    match outcome_tag {
                        ProviderTag::Failed => {
                            any_failed = true;
                        }
                        tag => {
                            success_tag.get_or_insert(tag);
                        }
                    }
                    found += created;
                }
                Ok(None) => {}
                Err(e) => {
                    any_failed = true;
                    last_error = Some(e);
                }
            }
        }

        let provider = success_tag.unwrap_or(if any_failed {
            ProviderTag::Failed
        } else {
            ProviderTag::None
        });
        let status = if any_failed {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        let mut entry = RunLogEntry::new(&source.id, status, provider);
        entry.articles_processed = processed;
        entry.startups_found = found;
        entry.error_message = last_error;
        info!(
            source = %source.name,
            processed, found, status = ?status,
            "Source run complete"
        );
        entry
    }

    /// Walk one candidate through dedup, fetch, extraction and persistence.
    ///
    /// `Ok(None)` means the article was skipped before the AI stage (bad
    /// URL, already seen, no usable text). `Ok(Some((tag, created)))` means
    /// the AI stage ran; `Err` carries a provider-chain failure message.
    async fn process_candidate(
        &self,
        source: &Source,
        candidate: &CandidateArticle,
    ) -> std::result::Result<Option<(ProviderTag, u32)>, String> {
        let Some(resolved) = content::canonicalize_url(&candidate.url) else {
            debug!(url = %candidate.url, "Unusable candidate URL, skipped");
            return Ok(None);
        };
        let Some(canonical) = dedup::normalize_url(&resolved) else {
            return Ok(None);
        };

        match self.storage.is_seen(&canonical).await {
            Ok(true) => {
                debug!(url = %canonical, "Already seen, skipped");
                return Ok(None);
            }
            Ok(false) => {}
            Err(e) => return Err(e.to_string()),
        }

        // A page fetch failure is tolerated, the feed summary may still be
        // enough for the extraction stage.
        let page = match self.pages.get(&resolved).await {
            Ok(html) => Some(html),
            Err(e) => {
                debug!(url = %resolved, error = %e, "Page fetch failed, using summary");
                None
            }
        };
        let selector = source.selectors.first().map(String::as_str);
        let Some(extracted) =
            content::extract_content(candidate, &canonical, page.as_deref(), selector)
        else {
            debug!(url = %canonical, "No usable text, skipped");
            return Ok(None);
        };

        let fp = dedup::fingerprint(&extracted.body);
        match self.storage.check_and_mark(&canonical, &fp).await {
            Ok(true) => {
                debug!(url = %canonical, "Duplicate content, skipped");
                return Ok(None);
            }
            Ok(false) => {}
            Err(e) => return Err(e.to_string()),
        }

        match self.engine.analyze(&extracted.title, &extracted.body).await {
            ExtractionOutcome::Funding(companies, tag) => {
                let mut created = 0;
                for company in companies {
                    let record = record_from(&company, &extracted, source);
                    match self.storage.upsert(&record).await {
                        Ok(true) => {
                            info!(name = %record.name, "💰 New startup discovered");
                            created += 1;
                        }
                        Ok(false) => {
                            debug!(name = %record.name, "Merged into existing record");
                        }
                        Err(e) => return Err(e.to_string()),
                    }
                }
                Ok(Some((tag, created)))
            }
            ExtractionOutcome::NoMatch(tag) => Ok(Some((tag, 0))),
            ExtractionOutcome::Failed(message) => Err(message),
        }
    }

    fn claim_source(&self, source_id: &str) -> bool {
        match self.in_flight.lock() {
            Ok(mut set) => set.insert(source_id.to_string()),
            Err(_) => false,
        }
    }

    fn release_source(&self, source_id: &str) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(source_id);
        }
    }
}

/// Shape a validated AI candidate into a persistable record.
fn record_from(
    candidate: &StartupCandidate,
    extracted: &ExtractedContent,
    source: &Source,
) -> StartupRecord {
    let mut record = StartupRecord::new(candidate.name.trim());
    record.funding_amount = candidate.funding_amount.clone();
    record.funding_stage = candidate.funding_stage.clone();
    record.investors = candidate.investors.clone();
    record.industry = candidate.industry.clone();
    record.location = candidate.location.clone();
    record.source_url = Some(extracted.canonical_url.clone());
    record.source_id = Some(source.id.clone());
    // discovered_at stays the persistence time; publish dates only order
    // candidates within a feed.
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::Utc;
    use ft_core::{Error, ExtractionModel, ExtractionResponse, StartupFilter};
    use ft_storage::MemoryStorage;

    const FUNDING_MARK: &str = "fund-signal";

    /// Recognizes `fund-signal <Name>` in the body and reports that company.
    struct MarkerModel {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MarkerModel {
        fn working(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExtractionModel for MarkerModel {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _title: &str, body: &str) -> ft_core::Result<ExtractionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Inference("provider down".to_string()));
            }
            let company = body
                .split_whitespace()
                .skip_while(|w| *w != FUNDING_MARK)
                .nth(1);
            Ok(match company {
                Some(name) => ExtractionResponse {
                    is_funding_news: true,
                    companies: vec![StartupCandidate {
                        name: name.to_string(),
                        funding_stage: Some("Seed".to_string()),
                        ..Default::default()
                    }],
                },
                None => ExtractionResponse::default(),
            })
        }
    }

    struct MockFetcher {
        fail_source: Option<String>,
        funding_every: usize,
        count: usize,
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        fn name(&self) -> &str {
            "mock"
        }

        fn can_handle(&self, _source: &Source) -> bool {
            true
        }

        async fn fetch(&self, source: &Source) -> ft_core::Result<Vec<CandidateArticle>> {
            if self.fail_source.as_deref() == Some(source.id.as_str()) {
                return Err(Error::Fetch("connection refused".to_string()));
            }
            Ok((0..self.count)
                .map(|i| {
                    let summary = if i % self.funding_every == 0 {
                        format!(
                            "{FUNDING_MARK} Acme{i} raised ten million dollars in a seed \
                             round led by Example Ventures this week."
                        )
                    } else {
                        format!(
                            "Regular industry update number {i} with enough length to \
                             clear the minimum summary threshold."
                        )
                    };
                    CandidateArticle {
                        source_id: source.id.clone(),
                        url: format!("https://news.example.com/{}/item-{i}", source.id),
                        title: format!("Story {i}"),
                        summary: Some(summary),
                        published_at: Some(Utc::now() - chrono::Duration::days(30)),
                        discovered_at: Utc::now(),
                    }
                })
                .collect())
        }
    }

    /// Always fails so the pipeline falls back to feed summaries.
    struct NoPages;

    #[async_trait]
    impl PageFetcher for NoPages {
        async fn get(&self, _url: &str) -> ft_core::Result<String> {
            Err(Error::Fetch("offline".to_string()))
        }
    }

    async fn seeded_storage(sources: &[&Source]) -> Arc<dyn Storage> {
        let storage = Arc::new(MemoryStorage::new());
        for source in sources {
            storage.add_source(source).await.unwrap();
        }
        storage
    }

    fn pipeline_with(
        storage: Arc<dyn Storage>,
        model: Arc<MarkerModel>,
        secondary: Option<Arc<MarkerModel>>,
        fetcher: MockFetcher,
    ) -> Arc<PipelineManager> {
        let engine = Arc::new(ExtractionEngine::new(
            model,
            secondary.map(|m| m as Arc<dyn ExtractionModel>),
        ));
        PipelineManager::with_parts(storage, engine, vec![Arc::new(fetcher)], Arc::new(NoPages))
    }

    #[tokio::test]
    async fn run_processes_articles_and_logs_once_per_source() {
        let source = Source::feed("Feed A", "https://a.example.com", "https://a.example.com/rss", &[]);
        let storage = seeded_storage(&[&source]).await;
        let model = MarkerModel::working("gemini");
        let pipeline = pipeline_with(
            storage.clone(),
            model.clone(),
            None,
            MockFetcher {
                fail_source: None,
                funding_every: 5,
                count: 15,
            },
        );

        let summary = pipeline.run_all().await;
        assert_eq!(summary.sources_run, 1);
        assert_eq!(summary.articles_processed, 15);
        assert_eq!(summary.startups_found, 3);

        let logs = storage.recent(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, RunStatus::Success);
        assert_eq!(logs[0].provider, ProviderTag::Primary);
        assert_eq!(logs[0].articles_processed, 15);
        assert_eq!(logs[0].startups_found, 3);

        let records = storage.list(&StartupFilter::default()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.source_url.is_some()));
        // records count as discovered now, not at the article's publish date
        assert!(records
            .iter()
            .all(|r| (Utc::now() - r.discovered_at).num_seconds() < 300));
    }

    #[tokio::test]
    async fn second_run_never_reanalyzes_seen_articles() {
        let source = Source::feed("Feed A", "https://a.example.com", "https://a.example.com/rss", &[]);
        let storage = seeded_storage(&[&source]).await;
        let model = MarkerModel::working("gemini");
        let pipeline = pipeline_with(
            storage.clone(),
            model.clone(),
            None,
            MockFetcher {
                fail_source: None,
                funding_every: 5,
                count: 10,
            },
        );

        pipeline.run_all().await;
        let calls_after_first = model.calls();
        assert_eq!(calls_after_first, 10);

        let summary = pipeline.run_all().await;
        assert_eq!(model.calls(), calls_after_first);
        assert_eq!(summary.articles_processed, 10);
        assert_eq!(summary.startups_found, 0);

        let logs = storage.recent(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        // no article reached the AI stage on the second run
        assert_eq!(logs[0].provider, ProviderTag::None);
    }

    #[tokio::test]
    async fn unreachable_source_fails_alone() {
        let down = Source::feed("Down", "https://down.example.com", "https://down.example.com/rss", &[]);
        let up = Source::feed("Up", "https://up.example.com", "https://up.example.com/rss", &[]);
        let storage = seeded_storage(&[&down, &up]).await;
        let pipeline = pipeline_with(
            storage.clone(),
            MarkerModel::working("gemini"),
            None,
            MockFetcher {
                fail_source: Some(down.id.clone()),
                funding_every: 2,
                count: 4,
            },
        );

        let summary = pipeline.run_all().await;
        assert_eq!(summary.sources_run, 2);

        let logs = storage.recent(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        let down_log = logs.iter().find(|l| l.source_id == down.id).unwrap();
        assert_eq!(down_log.status, RunStatus::Failure);
        assert_eq!(down_log.provider, ProviderTag::None);
        assert!(down_log.error_message.is_some());
        let up_log = logs.iter().find(|l| l.source_id == up.id).unwrap();
        assert_eq!(up_log.status, RunStatus::Success);
        assert_eq!(up_log.startups_found, 2);
    }

    #[tokio::test]
    async fn fallback_provider_is_tagged_in_run_log() {
        let source = Source::feed("Feed A", "https://a.example.com", "https://a.example.com/rss", &[]);
        let storage = seeded_storage(&[&source]).await;
        let pipeline = pipeline_with(
            storage.clone(),
            MarkerModel::failing("gemini"),
            Some(MarkerModel::working("openai")),
            MockFetcher {
                fail_source: None,
                funding_every: 2,
                count: 4,
            },
        );

        pipeline.run_all().await;
        let logs = storage.recent(10).await.unwrap();
        assert_eq!(logs[0].provider, ProviderTag::Secondary);
        assert_eq!(logs[0].status, RunStatus::Success);
        assert_eq!(logs[0].startups_found, 2);
    }

    #[tokio::test]
    async fn dead_provider_chain_marks_run_partial() {
        let source = Source::feed("Feed A", "https://a.example.com", "https://a.example.com/rss", &[]);
        let storage = seeded_storage(&[&source]).await;
        let pipeline = pipeline_with(
            storage.clone(),
            MarkerModel::failing("gemini"),
            None,
            MockFetcher {
                fail_source: None,
                funding_every: 2,
                count: 4,
            },
        );

        pipeline.run_all().await;
        let logs = storage.recent(10).await.unwrap();
        assert_eq!(logs[0].status, RunStatus::Partial);
        assert_eq!(logs[0].provider, ProviderTag::Failed);
        assert_eq!(logs[0].articles_processed, 4);
        assert_eq!(logs[0].startups_found, 0);
        assert!(logs[0].error_message.is_some());
    }

    #[tokio::test]
    async fn claimed_source_is_not_run_twice() {
        let source = Source::feed("Feed A", "https://a.example.com", "https://a.example.com/rss", &[]);
        let storage = seeded_storage(&[&source]).await;
        let pipeline = pipeline_with(
            storage.clone(),
            MarkerModel::working("gemini"),
            None,
            MockFetcher {
                fail_source: None,
                funding_every: 2,
                count: 2,
            },
        );

        assert!(pipeline.claim_source(&source.id));
        assert!(pipeline.run_source(&source).await.is_none());
        pipeline.release_source(&source.id);
        assert!(pipeline.run_source(&source).await.is_some());
    }
}
