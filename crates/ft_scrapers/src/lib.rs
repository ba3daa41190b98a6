pub mod content;
pub mod fetch;
pub mod pipeline;
pub mod rate_limit;

pub use pipeline::PipelineManager;
pub use rate_limit::RateLimiter;

pub mod prelude {
    pub use crate::fetch::{Fetcher, PageFetcher};
    pub use crate::PipelineManager;
    pub use ft_core::{CandidateArticle, Error, ExtractedContent, Result, Source};
}
