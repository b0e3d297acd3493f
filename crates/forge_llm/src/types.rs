//! Request and response types shared by every provider.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmResult;

/// Message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for one call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            seed: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }
}

/// Token usage of a call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(rename = "in")]
    pub input_tokens: u64,
    #[serde(rename = "out")]
    pub output_tokens: u64,
}

/// Result of a non-streaming call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: String,
    /// The model that produced this completion.
    #[serde(default)]
    pub model: String,
}

/// One item of a streaming call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_so_far: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn delta(delta: impl Into<String>, content_so_far: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            content_so_far: Some(content_so_far.into()),
            done: false,
            usage: None,
        }
    }

    pub fn done(content: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            delta: None,
            content_so_far: Some(content.into()),
            done: true,
            usage,
        }
    }
}

/// Async sequence of stream chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = LlmResult<StreamChunk>> + Send>>;

/// Drain a chunk stream into the final text.
pub async fn collect_stream(mut stream: ChunkStream) -> LlmResult<String> {
    use futures::StreamExt;

    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(delta) = &chunk.delta {
            text.push_str(delta);
        }
        if chunk.done {
            if let Some(full) = chunk.content_so_far {
                if full.len() >= text.len() {
                    text = full;
                }
            }
            break;
        }
    }
    Ok(text)
}
