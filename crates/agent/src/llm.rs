use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a chat turn, using the upstream model's vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "assistant")]
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPart {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub parts: Vec<ChatPart>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, parts: vec![ChatPart { text: text.into() }] }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Model, parts: vec![ChatPart { text: text.into() }] }
    }

    pub fn text(&self) -> String {
        self.parts.iter().map(|part| part.text.as_str()).collect::<Vec<_>>().join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm api key is not configured (set GEMINI_API_KEY or llm.api_key)")]
    MissingApiKey,
    #[error("could not build http client: {0}")]
    Client(String),
    #[error("llm transport failed: {0}")]
    Transport(String),
    #[error("llm responded with status {status}")]
    Status { status: u16, body: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
    #[error("llm response carried no candidate text")]
    EmptyCandidate,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Stand-in used when no API key is configured; every call fails as upstream-unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(LlmError::MissingApiKey.into())
    }
}
