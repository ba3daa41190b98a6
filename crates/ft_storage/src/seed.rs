//! Default sources seeded into an empty store at startup.

use std::sync::Arc;

use tracing::info;

use ft_core::{Result, Source, SourceRegistry, Storage};

pub fn default_sources() -> Vec<Source> {
    vec![
        Source::feed(
            "Economic Times Startups",
            "https://economictimes.indiatimes.com/small-biz/startups",
            "https://economictimes.indiatimes.com/small-biz/startups/rssfeeds/13352306.cms",
            &[".artText"],
        ),
        Source::feed(
            "Inc42",
            "https://inc42.com/buzz/",
            "https://inc42.com/feed/",
            &[".content-wrapper"],
        ),
        Source::search(
            "YourStory Funding Search",
            "https://yourstory.com/funding",
            &[
                "startup raises funding India",
                "Series A funding India",
                "seed round Indian startup",
            ],
            &[".story-content"],
        ),
    ]
}

/// Insert the default sources when the store has none configured yet.
pub async fn seed_defaults(storage: &Arc<dyn Storage>) -> Result<()> {
    if !storage.list_sources().await?.is_empty() {
        return Ok(());
    }
    let sources = default_sources();
    for source in &sources {
        storage.add_source(source).await?;
    }
    info!(count = sources.len(), "Seeded default sources");
    Ok(())
}
