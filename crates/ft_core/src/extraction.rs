use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One company as reported by a provider. Validated before it becomes a
/// `StartupRecord`: an empty name drops the candidate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StartupCandidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub funding_amount: Option<String>,
    #[serde(default)]
    pub funding_stage: Option<String>,
    #[serde(default)]
    pub investors: Vec<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl StartupCandidate {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// The structured payload every provider must produce. Unknown extra fields
/// in the raw response are ignored; a missing `is_funding_news` reads as
/// "not a funding announcement".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub is_funding_news: bool,
    #[serde(default)]
    pub companies: Vec<StartupCandidate>,
}

/// A structured-extraction provider. Implementations are thin HTTP clients;
/// the primary/secondary fallback lives above this seam.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Analyze one article and report any funding announcements in it.
    async fn extract(&self, title: &str, body: &str) -> Result<ExtractionResponse>;
}
