use std::sync::Arc;

use ft_core::{Error, Result, Storage};

pub mod backends;
pub mod export;
pub mod seed;
pub mod stats;

pub use backends::*;

/// Build a storage backend by name. `url` is the backend connection string
/// (ignored by the in-memory backend).
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Arc<dyn Storage>> {
    match kind {
        "memory" => Ok(Arc::new(memory::MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = url.unwrap_or("sqlite::memory:");
            Ok(Arc::new(sqlite::SqliteStorage::connect(url).await?))
        }
        other => Err(Error::Storage(format!(
            "Unknown storage backend: {}",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::backends::memory::MemoryStorage;
    pub use super::create_storage;
    pub use ft_core::{Result, Storage};
}
