//! Completion service wire types and HTTP client.
//!
//! The remote service speaks an OpenAI-style dialect:
//!
//! - `POST /chat/completions` for buffered and streamed replies
//! - `GET /stats`, `GET /health`, `GET /models` for the sidebar and diagnostics
//!
//! # Modules
//!
//! - [`client`]: [`CompletionClient`], the `reqwest`-based HTTP client
//! - [`sse`]: line framing and `data:` payload interpretation for streamed replies

pub mod client;
pub mod sse;

pub use client::{CompletionClient, FragmentStream};

use serde::{Deserialize, Serialize};

/// A single `{role, content}` message as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Author role (`user`, `assistant`, `system`).
    pub role: String,
    /// Message text.
    pub content: String,
}

impl WireMessage {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub stream: bool,
}

/// Buffered reply: `{choices:[{message:{content}}]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<ReplyMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if any.
    #[must_use]
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

/// One streamed chunk: `{choices:[{delta:{content}}]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// `GET /stats` reply. Every field is optional; the sidebar substitutes defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub total_documents: Option<u64>,
    #[serde(default)]
    pub total_chunks: Option<u64>,
    #[serde(default)]
    pub supported_topics: Option<u64>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub response_time: Option<String>,
    #[serde(default)]
    pub accuracy: Option<String>,
}

/// `GET /health` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
}

/// `GET /models` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}
