//! External generation service (LLM)
//!
//! The pipeline only sees the `GenerationService` trait: it hands over a
//! rendered prompt plus the structured input document and gets back a JSON
//! value, which the executor then checks against the stage's shape.

mod chat;
pub mod templates;

pub use chat::{ChatCompletionGenerator, ChatSettings};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Empty response from generation service")]
    EmptyResponse,

    #[error("Response is not a JSON object: {0}")]
    InvalidJson(String),

    #[error("Generation service not configured: {0}")]
    NotConfigured(String),
}

/// One call to the generation service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt_key: String,
    pub prompt_version: i64,
    /// Template rendered with the input document
    pub prompt: String,
    pub input: Value,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Provider identifier for logs
    fn provider(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}
