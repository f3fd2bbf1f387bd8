//! OpenAI-compatible chat-completions client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{GenerationError, GenerationRequest, GenerationService};

const SYSTEM_PROMPT: &str = "You are a senior equity and industry research analyst. \
Answer with a single JSON object that follows the requested structure exactly. \
Do not add commentary outside the JSON.";

/// Connection settings for the chat-completions endpoint
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionGenerator {
    http_client: reqwest::Client,
    settings: ChatSettings,
}

impl ChatCompletionGenerator {
    pub fn new(settings: ChatSettings) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }
}

#[async_trait]
impl GenerationService for ChatCompletionGenerator {
    fn provider(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            GenerationError::NotConfigured("no API key (set INSIGHTS_LLM_API_KEY)".to_string())
        })?;

        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(
            model = %self.settings.model,
            prompt_key = %request.prompt_key,
            prompt_length = request.prompt.len(),
            "Calling generation service"
        );

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Generation service request failed");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::InvalidJson(e.to_string()))?;

        tracing::debug!(usage = ?chat.usage, "Generation service response received");

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        parse_json_content(&content)
    }
}

/// Parse model output as a JSON object, tolerating a Markdown code fence
pub(crate) fn parse_json_content(content: &str) -> Result<Value, GenerationError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: Value = serde_json::from_str(unfenced)
        .map_err(|e| GenerationError::InvalidJson(e.to_string()))?;

    if !value.is_object() {
        return Err(GenerationError::InvalidJson(format!(
            "expected object, got {}",
            value
        )));
    }
    Ok(value)
}
