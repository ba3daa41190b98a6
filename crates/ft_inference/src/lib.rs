use std::sync::Arc;

use ft_core::{Error, ExtractionModel, Result};

pub mod engine;
pub mod models;
pub mod prompt;

pub use engine::ExtractionEngine;

/// Provider configuration, filled from CLI flags and environment.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub openai_model: Option<String>,
}

/// Build the primary→secondary provider chain from whatever keys are
/// configured. Gemini is the primary when available; OpenAI covers the
/// fallback slot, or the primary slot if it is the only provider.
pub fn create_engine(config: EngineConfig) -> Result<ExtractionEngine> {
    let gemini = config
        .gemini_api_key
        .as_deref()
        .map(|key| models::gemini::GeminiModel::new(key, config.gemini_model.as_deref()))
        .map(|m| Arc::new(m) as Arc<dyn ExtractionModel>);
    let openai = config
        .openai_api_key
        .as_deref()
        .map(|key| models::openai::OpenAiModel::new(key, config.openai_model.as_deref()))
        .map(|m| Arc::new(m) as Arc<dyn ExtractionModel>);

    match (gemini, openai) {
        (Some(primary), secondary) => Ok(ExtractionEngine::new(primary, secondary)),
        (None, Some(primary)) => {
            tracing::warn!("No Gemini key configured, running without a fallback provider");
            Ok(ExtractionEngine::new(primary, None))
        }
        (None, None) => Err(Error::Inference(
            "No extraction provider API key configured".to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::{create_engine, EngineConfig, ExtractionEngine};
    pub use ft_core::{ExtractionModel, ExtractionResponse, Result};
}
