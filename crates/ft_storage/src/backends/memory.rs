use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use ft_core::{
    DedupStore, Result, RunLogEntry, RunLogStore, Source, SourceRegistry, StartupFilter,
    StartupRecord, StartupStore, Storage,
};

#[derive(Default)]
struct MemoryStore {
    sources: Vec<Source>,
    startups: Vec<StartupRecord>,
    seen_urls: HashSet<String>,
    seen_fingerprints: HashSet<String>,
    logs: Vec<RunLogEntry>,
}

/// In-memory backend. The default for tests and one-shot CLI runs; every
/// writer goes through the write lock, which linearizes upserts.
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(MemoryStore::default()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceRegistry for MemoryStorage {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.store.read().await.sources.clone())
    }

    async fn add_source(&self, source: &Source) -> Result<()> {
        self.store.write().await.sources.push(source.clone());
        Ok(())
    }
}

#[async_trait]
impl StartupStore for MemoryStorage {
    async fn upsert(&self, candidate: &StartupRecord) -> Result<bool> {
        let mut store = self.store.write().await;
        let key = candidate.dedup_key();
        if let Some(existing) = store.startups.iter_mut().find(|r| r.dedup_key() == key) {
            existing.merge_from(candidate);
            return Ok(false);
        }
        store.startups.push(candidate.clone());
        Ok(true)
    }

    async fn list(&self, filter: &StartupFilter) -> Result<Vec<StartupRecord>> {
        let store = self.store.read().await;
        let mut records: Vec<StartupRecord> = store
            .startups
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));
        Ok(records
            .into_iter()
            .skip(filter.skip)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn all(&self) -> Result<Vec<StartupRecord>> {
        let store = self.store.read().await;
        let mut records = store.startups.clone();
        records.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));
        Ok(records)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let store = self.store.read().await;
        Ok(store
            .startups
            .iter()
            .filter(|r| r.discovered_at >= since)
            .count() as u64)
    }
}

#[async_trait]
impl DedupStore for MemoryStorage {
    async fn is_seen(&self, canonical_url: &str) -> Result<bool> {
        Ok(self.store.read().await.seen_urls.contains(canonical_url))
    }

    async fn check_and_mark(&self, canonical_url: &str, fingerprint: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        let seen = store.seen_urls.contains(canonical_url)
            || store.seen_fingerprints.contains(fingerprint);
        store.seen_urls.insert(canonical_url.to_string());
        store.seen_fingerprints.insert(fingerprint.to_string());
        Ok(seen)
    }
}

#[async_trait]
impl RunLogStore for MemoryStorage {
    async fn append(&self, entry: &RunLogEntry) -> Result<()> {
        self.store.write().await.logs.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RunLogEntry>> {
        let store = self.store.read().await;
        let mut logs = store.logs.clone();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit);
        Ok(logs)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
