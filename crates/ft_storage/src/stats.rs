//! Aggregate dashboard stats over the startup store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use ft_core::{Result, StartupRecord, StartupStore, Storage};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupStats {
    pub total_startups: u64,
    pub recent_discoveries: u64,
    pub funding_stages: Vec<FieldCount>,
    pub top_industries: Vec<FieldCount>,
}

/// Count records grouped by a field, descending, capped at `limit`.
/// Records without the field fall under "unknown".
pub fn group_counts<F>(records: &[StartupRecord], field: F, limit: usize) -> Vec<FieldCount>
where
    F: Fn(&StartupRecord) -> Option<&str>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        let key = field(record).unwrap_or("unknown").to_string();
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut out: Vec<FieldCount> = counts
        .into_iter()
        .map(|(value, count)| FieldCount { value, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));
    out.truncate(limit);
    out
}

pub async fn compute_stats(storage: &Arc<dyn Storage>) -> Result<StartupStats> {
    let records = storage.all().await?;
    let recent = storage.count_since(Utc::now() - Duration::hours(24)).await?;
    Ok(StartupStats {
        total_startups: records.len() as u64,
        recent_discoveries: recent,
        funding_stages: group_counts(&records, |r| r.funding_stage.as_deref(), 10),
        top_industries: group_counts(&records, |r| r.industry.as_deref(), 10),
    })
}
