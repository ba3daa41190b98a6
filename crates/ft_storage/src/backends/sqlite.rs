use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;

use ft_core::{
    DedupStore, Error, ProviderTag, Result, RunLogEntry, RunLogStore, RunStatus, Source,
    SourceRegistry, StartupFilter, StartupRecord, StartupStore, Storage,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    feed_url TEXT,
    selectors TEXT NOT NULL DEFAULT '[]',
    queries TEXT NOT NULL DEFAULT '[]',
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS startups (
    id TEXT PRIMARY KEY,
    dedup_key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    funding_amount TEXT,
    funding_stage TEXT,
    investors TEXT NOT NULL DEFAULT '[]',
    industry TEXT,
    location TEXT,
    website TEXT,
    linkedin_profile TEXT,
    source_url TEXT,
    source_id TEXT,
    discovered_at TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS seen_articles (
    url TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS seen_fingerprints (
    fingerprint TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS run_logs (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    status TEXT NOT NULL,
    articles_processed INTEGER NOT NULL,
    startups_found INTEGER NOT NULL,
    error_message TEXT,
    provider TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
"#;

/// SQLite backend behind the `sqlite` feature flag. Writers to the startups
/// and dedup tables are serialized through `writer`, which keeps the
/// read-merge-write upsert single-writer per dedup key.
pub struct SqliteStorage {
    pool: SqlitePool,
    writer: Mutex<()>,
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Storage(e.to_string())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Bad timestamp {raw:?}: {e}")))
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "success",
        RunStatus::Partial => "partial",
        RunStatus::Failure => "failure",
    }
}

fn status_from(raw: &str) -> RunStatus {
    match raw {
        "partial" => RunStatus::Partial,
        "failure" => RunStatus::Failure,
        _ => RunStatus::Success,
    }
}

fn provider_str(tag: ProviderTag) -> &'static str {
    match tag {
        ProviderTag::Primary => "primary",
        ProviderTag::Secondary => "secondary",
        ProviderTag::Failed => "failed",
        ProviderTag::None => "none",
    }
}

fn provider_from(raw: &str) -> ProviderTag {
    match raw {
        "primary" => ProviderTag::Primary,
        "secondary" => ProviderTag::Secondary,
        "failed" => ProviderTag::Failed,
        _ => ProviderTag::None,
    }
}

impl SqliteStorage {
    pub async fn connect(url: &str) -> Result<Self> {
        let url = if url.starts_with("sqlite") {
            url.to_string()
        } else {
            format!("sqlite://{}", url)
        };
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(db_err)?
            .create_if_missing(true);
        // A shared in-memory database only exists per connection.
        let max_conns = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_conns)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(db_err)?;
        Ok(Self {
            pool,
            writer: Mutex::new(()),
        })
    }

    fn row_to_source(row: &SqliteRow) -> Result<Source> {
        Ok(Source {
            id: row.get("id"),
            name: row.get("name"),
            url: row.get("url"),
            feed_url: row.get("feed_url"),
            selectors: serde_json::from_str(row.get::<String, _>("selectors").as_str())?,
            queries: serde_json::from_str(row.get::<String, _>("queries").as_str())?,
            active: row.get::<i64, _>("active") != 0,
            created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
        })
    }

    fn row_to_record(row: &SqliteRow) -> Result<StartupRecord> {
        Ok(StartupRecord {
            id: row.get("id"),
            name: row.get("name"),
            funding_amount: row.get("funding_amount"),
            funding_stage: row.get("funding_stage"),
            investors: serde_json::from_str(row.get::<String, _>("investors").as_str())?,
            industry: row.get("industry"),
            location: row.get("location"),
            website: row.get("website"),
            linkedin_profile: row.get("linkedin_profile"),
            source_url: row.get("source_url"),
            source_id: row.get("source_id"),
            discovered_at: parse_ts(row.get::<String, _>("discovered_at").as_str())?,
            last_updated: parse_ts(row.get::<String, _>("last_updated").as_str())?,
        })
    }

    async fn insert_record(&self, record: &StartupRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO startups
               (id, dedup_key, name, funding_amount, funding_stage, investors,
                industry, location, website, linkedin_profile, source_url,
                source_id, discovered_at, last_updated)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.id)
        .bind(record.dedup_key())
        .bind(&record.name)
        .bind(&record.funding_amount)
        .bind(&record.funding_stage)
        .bind(serde_json::to_string(&record.investors)?)
        .bind(&record.industry)
        .bind(&record.location)
        .bind(&record.website)
        .bind(&record.linkedin_profile)
        .bind(&record.source_url)
        .bind(&record.source_id)
        .bind(record.discovered_at.to_rfc3339())
        .bind(record.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_record(&self, record: &StartupRecord) -> Result<()> {
        sqlx::query(
            r#"UPDATE startups SET
               funding_amount = ?, funding_stage = ?, investors = ?,
               industry = ?, location = ?, website = ?, linkedin_profile = ?,
               source_url = ?, source_id = ?, last_updated = ?
               WHERE id = ?"#,
        )
        .bind(&record.funding_amount)
        .bind(&record.funding_stage)
        .bind(serde_json::to_string(&record.investors)?)
        .bind(&record.industry)
        .bind(&record.location)
        .bind(&record.website)
        .bind(&record.linkedin_profile)
        .bind(&record.source_url)
        .bind(&record.source_id)
        .bind(record.last_updated.to_rfc3339())
        .bind(&record.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl SourceRegistry for SqliteStorage {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_source).collect()
    }

    async fn add_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO sources
               (id, name, url, feed_url, selectors, queries, active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&source.id)
        .bind(&source.name)
        .bind(&source.url)
        .bind(&source.feed_url)
        .bind(serde_json::to_string(&source.selectors)?)
        .bind(serde_json::to_string(&source.queries)?)
        .bind(source.active as i64)
        .bind(source.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl StartupStore for SqliteStorage {
    async fn upsert(&self, candidate: &StartupRecord) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let existing = sqlx::query("SELECT * FROM startups WHERE dedup_key = ?")
            .bind(candidate.dedup_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match existing {
            Some(row) => {
                let mut record = Self::row_to_record(&row)?;
                if record.merge_from(candidate) {
                    self.update_record(&record).await?;
                }
                Ok(false)
            }
            None => {
                self.insert_record(candidate).await?;
                Ok(true)
            }
        }
    }

    async fn list(&self, filter: &StartupFilter) -> Result<Vec<StartupRecord>> {
        // Substring filters run in Rust so memory and SQLite backends share
        // the same matching semantics.
        let records = self.all().await?;
        Ok(records
            .into_iter()
            .filter(|r| filter.matches(r))
            .skip(filter.skip)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn all(&self) -> Result<Vec<StartupRecord>> {
        let rows = sqlx::query("SELECT * FROM startups ORDER BY discovered_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM startups WHERE discovered_at >= ?")
            .bind(since.to_rfc3339())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl DedupStore for SqliteStorage {
    async fn is_seen(&self, canonical_url: &str) -> Result<bool> {
        let seen: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM seen_articles WHERE url = ?)")
                .bind(canonical_url)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(seen != 0)
    }

    async fn check_and_mark(&self, canonical_url: &str, fingerprint: &str) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let seen: i64 = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM seen_articles WHERE url = ?)
               OR EXISTS(SELECT 1 FROM seen_fingerprints WHERE fingerprint = ?)"#,
        )
        .bind(canonical_url)
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("INSERT OR IGNORE INTO seen_articles (url) VALUES (?)")
            .bind(canonical_url)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("INSERT OR IGNORE INTO seen_fingerprints (fingerprint) VALUES (?)")
            .bind(fingerprint)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(seen != 0)
    }
}

#[async_trait]
impl RunLogStore for SqliteStorage {
    async fn append(&self, entry: &RunLogEntry) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO run_logs
               (id, source_id, status, articles_processed, startups_found,
                error_message, provider, timestamp)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&entry.id)
        .bind(&entry.source_id)
        .bind(status_str(entry.status))
        .bind(entry.articles_processed as i64)
        .bind(entry.startups_found as i64)
        .bind(&entry.error_message)
        .bind(provider_str(entry.provider))
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RunLogEntry>> {
        let rows = sqlx::query("SELECT * FROM run_logs ORDER BY timestamp DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(RunLogEntry {
                    id: row.get("id"),
                    source_id: row.get("source_id"),
                    status: status_from(row.get::<String, _>("status").as_str()),
                    articles_processed: row.get::<i64, _>("articles_processed") as u32,
                    startups_found: row.get::<i64, _>("startups_found") as u32,
                    error_message: row.get("error_message"),
                    provider: provider_from(row.get::<String, _>("provider").as_str()),
                    timestamp: parse_ts(row.get::<String, _>("timestamp").as_str())?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn health(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
