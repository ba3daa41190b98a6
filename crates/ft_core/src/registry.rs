use async_trait::async_trait;

use crate::types::Source;
use crate::Result;

/// Read view over configured sources. Create/update/delete lives outside
/// the pipeline; this trait only has to keep the read side consistent.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<Source>>;

    async fn list_active_sources(&self) -> Result<Vec<Source>> {
        Ok(self
            .list_sources()
            .await?
            .into_iter()
            .filter(|s| s.active)
            .collect())
    }

    /// Used only for seeding defaults into an empty store.
    async fn add_source(&self, source: &Source) -> Result<()>;
}
