pub mod dedup;
pub mod error;
pub mod extraction;
pub mod registry;
pub mod storage;
pub mod types;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use extraction::{ExtractionModel, ExtractionResponse, StartupCandidate};
pub use registry::SourceRegistry;
pub use storage::{DedupStore, RunLogStore, StartupFilter, StartupStore, Storage};
pub use types::{
    CandidateArticle, ExtractedContent, ExtractionOutcome, ProviderTag, RunLogEntry, RunStatus,
    Source, StartupRecord,
};

pub mod prelude {
    pub use crate::types::*;
    pub use crate::{Error, Result};
}
