use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use ft_core::{Error, ExtractionModel, ExtractionResponse, Result};

use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

/// Secondary provider: OpenAI chat completions with a general-purpose model.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiModel {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

impl fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl ExtractionModel for OpenAiModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(&self, title: &str, body: &str) -> Result<ExtractionResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_prompt(title, body),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Inference(format!(
                "OpenAI returned {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::Inference("OpenAI reply had no choices".to_string()))?;

        super::parse_response(content)
    }
}
