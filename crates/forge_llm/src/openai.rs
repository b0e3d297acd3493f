//! OpenAI chat completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::ProviderKind;
use crate::error::{LlmError, LlmResult};
use crate::provider::ProviderClient;
use crate::sse::{spawn_chunk_stream, SseAction, SseEvent};
use crate::types::{ChatMessage, ChunkStream, Completion, GenerateOptions, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI chat completions API.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Client from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL`.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
        let mut client = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.is_empty() {
                client = client.with_base_url(url);
            }
        }
        Some(client)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
        stream: bool,
    ) -> OpenAiRequest {
        OpenAiRequest {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: Some(opts.temperature),
            seed: opts.seed,
            max_completion_tokens: opts.max_tokens,
            tools: opts.tools.clone(),
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    async fn send(&self, request: &OpenAiRequest) -> LlmResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("OpenAI request: model={} stream={}", request.model, request.stream);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }
}

/// Map one streamed chunk to actions.
fn handle_event(event: &SseEvent) -> LlmResult<Vec<SseAction>> {
    if event.data.trim() == "[DONE]" {
        return Ok(vec![SseAction::Done]);
    }
    let chunk: OpenAiStreamChunk = serde_json::from_str(&event.data)?;
    let mut actions = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content {
            actions.push(SseAction::Delta(text));
        }
    }
    if let Some(usage) = chunk.usage {
        actions.push(SseAction::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }
    Ok(actions)
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<Completion> {
        let request = Self::build_request(model, messages, opts, false);
        let response = self.send(&request).await?;
        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("No choices in OpenAI response".to_string()))?;
        let usage = result
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            usage,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            model: model.to_string(),
        })
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<ChunkStream> {
        let request = Self::build_request(model, messages, opts, true);
        let response = self.send(&request).await?;
        Ok(spawn_chunk_stream(response, handle_event))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}
