//! Anthropic messages API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::ProviderKind;
use crate::error::{LlmError, LlmResult};
use crate::provider::ProviderClient;
use crate::sse::{spawn_chunk_stream, SseAction, SseEvent};
use crate::types::{ChatMessage, ChunkStream, Completion, GenerateOptions, Role, Usage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client for the Anthropic messages API.
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Client from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Option<Self> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(Self::new)
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
    ) -> AnthropicRequest {
        // The system prompt travels outside the message list.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        AnthropicRequest {
            model: model.to_string(),
            max_tokens: opts.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| AnthropicMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: Some(opts.temperature),
            tools: opts.tools.clone(),
            stream,
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> LlmResult<reqwest::Response> {
        let url = format!("{}/messages", self.base_url);
        debug!("Anthropic request: model={} stream={}", request.model, request.stream);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

fn handle_event(event: &SseEvent) -> LlmResult<Vec<SseAction>> {
    let parsed: AnthropicStreamEvent = serde_json::from_str(&event.data)?;
    let actions = match parsed {
        AnthropicStreamEvent::MessageStart { message } => message
            .usage
            .map(|u| vec![SseAction::Usage(u.into())])
            .unwrap_or_default(),
        AnthropicStreamEvent::ContentBlockDelta { delta } => match delta.text {
            Some(text) => vec![SseAction::Delta(text)],
            None => Vec::new(),
        },
        AnthropicStreamEvent::MessageDelta { usage } => usage
            .map(|u| vec![SseAction::Usage(u.into())])
            .unwrap_or_default(),
        AnthropicStreamEvent::MessageStop => vec![SseAction::Done],
        AnthropicStreamEvent::Error { error } => {
            let status = if error.error_type == "overloaded_error" { 529 } else { 500 };
            return Err(LlmError::Server {
                status,
                message: error.message,
            });
        }
        AnthropicStreamEvent::Other => Vec::new(),
    };
    Ok(actions)
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn generate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<Completion> {
        let request = Self::build_request(model, messages, opts, false);
        let response = self.send(&request).await?;
        let result: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content: String = result
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect();
        if content.is_empty() {
            return Err(LlmError::Parse("No text in Anthropic response".to_string()));
        }

        Ok(Completion {
            content,
            usage: result.usage.map(Usage::from).unwrap_or_default(),
            finish_reason: result.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
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
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl From<AnthropicUsage> for Usage {
    fn from(u: AnthropicUsage) -> Self {
        Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart { message: AnthropicStreamMessage },
    ContentBlockDelta { delta: AnthropicDelta },
    MessageDelta { usage: Option<AnthropicUsage> },
    MessageStop,
    Error { error: AnthropicErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamMessage {
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
