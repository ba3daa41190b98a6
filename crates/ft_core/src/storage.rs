use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::registry::SourceRegistry;
use crate::types::{RunLogEntry, StartupRecord};
use crate::Result;

/// Filters for the startup listing: case-insensitive substring match,
/// AND semantics across the set fields.
#[derive(Debug, Clone, Default)]
pub struct StartupFilter {
    pub industry: Option<String>,
    pub location: Option<String>,
    pub funding_stage: Option<String>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl StartupFilter {
    pub fn matches(&self, record: &StartupRecord) -> bool {
        fn contains(field: &Option<String>, needle: &Option<String>) -> bool {
            match needle {
                None => true,
                Some(n) => field
                    .as_deref()
                    .map(|f| f.to_lowercase().contains(&n.to_lowercase()))
                    .unwrap_or(false),
            }
        }
        contains(&record.industry, &self.industry)
            && contains(&record.location, &self.location)
            && contains(&record.funding_stage, &self.funding_stage)
    }
}

/// Persistence sink for startup records.
#[async_trait]
pub trait StartupStore: Send + Sync {
    /// Insert the candidate, or merge it into the record sharing its dedup
    /// key. Merging only fills empty fields. Returns true when a new record
    /// was created.
    async fn upsert(&self, candidate: &StartupRecord) -> Result<bool>;

    /// Filtered listing, newest discovery first.
    async fn list(&self, filter: &StartupFilter) -> Result<Vec<StartupRecord>>;

    /// Every record, newest first. Backs export and stats.
    async fn all(&self) -> Result<Vec<StartupRecord>>;

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64>;
}

/// Persisted set of already-processed articles. Membership is independent
/// of whether a startup record was produced, so each canonical URL is
/// AI-analyzed at most once across the lifetime of the system.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Cheap pre-check by canonical URL, before the page is fetched.
    async fn is_seen(&self, canonical_url: &str) -> Result<bool>;

    /// Atomic check-and-mark by URL and content fingerprint. Returns true
    /// when the article was already known under either identity; in every
    /// case both identities are recorded.
    async fn check_and_mark(&self, canonical_url: &str, fingerprint: &str) -> Result<bool>;
}

/// Append-only run log, one entry per (source, run).
#[async_trait]
pub trait RunLogStore: Send + Sync {
    async fn append(&self, entry: &RunLogEntry) -> Result<()>;

    /// Newest entries first.
    async fn recent(&self, limit: usize) -> Result<Vec<RunLogEntry>>;
}

/// Everything a storage backend provides to the pipeline and web surface.
#[async_trait]
pub trait Storage: SourceRegistry + StartupStore + DedupStore + RunLogStore {
    /// Storage reachability, surfaced by the health endpoint.
    async fn health(&self) -> Result<()>;
}
