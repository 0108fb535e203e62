//! Gemini `generateContent` client.

use anyhow::Result;
use async_trait::async_trait;
use cotizador_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{ChatPart, ChatTurn, CompletionRequest, LlmClient, LlmError};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.7, top_p: 1.0, top_k: 1 }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    contents: &'a [ChatTurn],
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<ChatPart>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        generation: GenerationConfig,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| LlmError::Client(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            generation,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        Self::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
            GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
            },
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint without the key query parameter; safe to log.
    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn request_body<'a>(&self, request: &'a CompletionRequest) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: &request.history,
            system_instruction: SystemInstruction {
                parts: vec![ChatPart { text: request.system_prompt.clone() }],
            },
            generation_config: self.generation,
        }
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        debug!(
            event_name = "agent.upstream.request",
            model = %self.model,
            turns = request.history.len(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "agent.upstream.status",
                status = status.as_u16(),
                body = %body,
                "generateContent returned a non-success status"
            );
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let body = response
            .text()
            .await
            .map_err(|error| LlmError::Transport(error.without_url().to_string()))?;
        first_candidate_text(&body)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        Ok(self.generate(request).await?)
    }
}

/// `candidates[0].content.parts[0].text`, rejecting blocked or empty answers.
pub fn first_candidate_text(body: &str) -> Result<String, LlmError> {
    let parsed = serde_json::from_str::<GenerateContentResponse>(body)
        .map_err(|error| LlmError::Decode(error.to_string()))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyCandidate)
}
