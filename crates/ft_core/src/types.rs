use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured news origin the pipeline polls for candidate articles.
///
/// Either a feed descriptor (`feed_url` set) or a search-query descriptor
/// (`queries` set). Created and edited by an external management surface;
/// the pipeline only ever reads sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub feed_url: Option<String>,
    /// CSS selector hints for the article body, tried in order before the
    /// generic fallback selectors.
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Search terms for query sources. Empty for feed sources.
    #[serde(default)]
    pub queries: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn feed(name: &str, url: &str, feed_url: &str, selectors: &[&str]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: url.to_string(),
            feed_url: Some(feed_url.to_string()),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            queries: Vec::new(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn search(name: &str, url: &str, queries: &[&str], selectors: &[&str]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: url.to_string(),
            feed_url: None,
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            queries: queries.iter().map(|q| q.to_string()).collect(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_feed(&self) -> bool {
        self.feed_url.is_some()
    }
}

/// One fetched item, before text normalization. Lives only within a run.
#[derive(Debug, Clone)]
pub struct CandidateArticle {
    pub source_id: String,
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
}

/// A candidate article reduced to plain text with a fully resolved URL.
///
/// `canonical_url` has redirect wrappers unwrapped and tracking parameters
/// stripped before it is used as the dedup identity.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub canonical_url: String,
    pub title: String,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A persisted funding discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartupRecord {
    pub id: String,
    pub name: String,
    pub funding_amount: Option<String>,
    pub funding_stage: Option<String>,
    #[serde(default)]
    pub investors: Vec<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin_profile: Option<String>,
    pub source_url: Option<String>,
    pub source_id: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StartupRecord {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            funding_amount: None,
            funding_stage: None,
            investors: Vec::new(),
            industry: None,
            location: None,
            website: None,
            linkedin_profile: None,
            source_url: None,
            source_id: None,
            discovered_at: now,
            last_updated: now,
        }
    }

    /// Identity used for upsert matching: the normalized company name, so
    /// a second article about the same funding event merges into the
    /// existing record instead of creating a duplicate.
    pub fn dedup_key(&self) -> String {
        crate::dedup::record_key(&self.name)
    }

    /// Fill empty fields of `self` from `other`. Populated fields are never
    /// overwritten, so a later article can enrich a record but not erase it.
    pub fn merge_from(&mut self, other: &StartupRecord) -> bool {
        fn fill(dst: &mut Option<String>, src: &Option<String>) -> bool {
            let empty = dst.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
            if empty && src.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false) {
                *dst = src.clone();
                return true;
            }
            false
        }

        let mut changed = false;
        changed |= fill(&mut self.funding_amount, &other.funding_amount);
        changed |= fill(&mut self.funding_stage, &other.funding_stage);
        changed |= fill(&mut self.industry, &other.industry);
        changed |= fill(&mut self.location, &other.location);
        changed |= fill(&mut self.website, &other.website);
        changed |= fill(&mut self.linkedin_profile, &other.linkedin_profile);
        changed |= fill(&mut self.source_url, &other.source_url);
        changed |= fill(&mut self.source_id, &other.source_id);
        if self.investors.is_empty() && !other.investors.is_empty() {
            self.investors = other.investors.clone();
            changed = true;
        }
        if changed {
            self.last_updated = Utc::now();
        }
        changed
    }
}

/// Outcome status of one (source, run) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

/// Which provider actually serviced the AI extraction for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Primary,
    Secondary,
    Failed,
    /// No article reached the AI stage this run.
    None,
}

/// One append-only log row per (source, run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: String,
    pub source_id: String,
    pub status: RunStatus,
    pub articles_processed: u32,
    pub startups_found: u32,
    pub error_message: Option<String>,
    pub provider: ProviderTag,
    pub timestamp: DateTime<Utc>,
}

impl RunLogEntry {
    pub fn new(source_id: &str, status: RunStatus, provider: ProviderTag) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            status,
            articles_processed: 0,
            startups_found: 0,
            error_message: None,
            provider,
            timestamp: Utc::now(),
        }
    }
}

/// Result of one AI extraction attempt over one article, tagged with the
/// provider that serviced it so the run logger can match exhaustively.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    /// The article announces funding; zero or more valid company candidates.
    Funding(Vec<crate::extraction::StartupCandidate>, ProviderTag),
    /// The article is not a funding announcement.
    NoMatch(ProviderTag),
    /// Every provider in the chain failed.
    Failed(String),
}
