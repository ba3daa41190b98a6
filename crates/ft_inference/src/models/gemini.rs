use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use ft_core::{Error, ExtractionModel, ExtractionResponse, Result};

use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "gemini-2.5-pro";

#[derive(Serialize)]
struct GenerateRequest {
    system_instruction: ContentPart,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct ContentPart {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// Primary provider: Google's generative-language API.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl ExtractionModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, title: &str, body: &str) -> Result<ExtractionResponse> {
        let request = GenerateRequest {
            system_instruction: ContentPart {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: build_user_prompt(title, body),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Quota, auth and rate-limit errors all surface here; the
            // engine above decides whether to fall back.
            return Err(Error::Inference(format!(
                "Gemini returned {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let reply: GenerateResponse = response.json().await?;
        let text = reply
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| Error::Inference("Gemini reply had no candidates".to_string()))?;

        super::parse_response(text)
    }
}
