//! Scripted in-process provider.
//!
//! Answers come from a responder closure; failures can be injected per
//! model. Used for offline runs and as the test double for the router and
//! everything above it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::catalog::ProviderKind;
use crate::error::{LlmError, LlmResult};
use crate::provider::ProviderClient;
use crate::types::{ChatMessage, ChunkStream, Completion, GenerateOptions, Role, StreamChunk, Usage};

type Responder = Arc<dyn Fn(&ScriptRequest) -> String + Send + Sync>;

/// What the responder sees.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub opts: GenerateOptions,
    pub streaming: bool,
}

impl ScriptRequest {
    /// Content of the last user message.
    pub fn last_user(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    pub fn system(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Default)]
struct Failures {
    queued: HashMap<String, VecDeque<LlmError>>,
    always: HashMap<String, LlmError>,
}

/// Scripted provider.
#[derive(Clone)]
pub struct ScriptedProvider {
    responder: Responder,
    failures: Arc<RwLock<Failures>>,
    captured: Arc<RwLock<Vec<ScriptRequest>>>,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl ScriptedProvider {
    pub fn new(responder: impl Fn(&ScriptRequest) -> String + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            failures: Arc::new(RwLock::new(Failures::default())),
            captured: Arc::new(RwLock::new(Vec::new())),
            chunk_size: 16,
            chunk_delay: Duration::ZERO,
        }
    }

    /// Always answer with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| reply.clone())
    }

    /// Answer with the last user message.
    pub fn echo() -> Self {
        Self::new(|req| req.last_user().to_string())
    }

    /// Every call fails with a network error.
    pub fn unreachable() -> Self {
        let provider = Self::echo();
        provider
            .failures
            .write()
            .always
            .insert("*".to_string(), LlmError::Network("connection refused".to_string()));
        provider
    }

    /// Fail the next call to `model` with `error`; repeated calls queue up.
    pub fn fail_next(self, model: impl Into<String>, error: LlmError) -> Self {
        self.failures
            .write()
            .queued
            .entry(model.into())
            .or_default()
            .push_back(error);
        self
    }

    /// Fail every call to `model`.
    pub fn fail_always(self, model: impl Into<String>, error: LlmError) -> Self {
        self.failures.write().always.insert(model.into(), error);
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Pause between streamed chunks.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<ScriptRequest> {
        self.captured.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Models called so far, in order.
    pub fn models_called(&self) -> Vec<String> {
        self.captured.read().iter().map(|r| r.model.clone()).collect()
    }

    fn check_failure(&self, model: &str) -> LlmResult<()> {
        let mut failures = self.failures.write();
        if let Some(err) = failures.queued.get_mut(model).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        if let Some(err) = failures.always.get(model).or_else(|| failures.always.get("*")) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn answer(&self, model: &str, messages: &[ChatMessage], opts: &GenerateOptions, streaming: bool) -> LlmResult<(String, Usage)> {
        let request = ScriptRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            opts: opts.clone(),
            streaming,
        };
        self.captured.write().push(request.clone());
        self.check_failure(model)?;

        let content = (self.responder)(&request);
        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        let usage = Usage {
            input_tokens: estimate_tokens(prompt_chars),
            output_tokens: estimate_tokens(content.chars().count()),
        };
        Ok((content, usage))
    }
}

fn estimate_tokens(chars: usize) -> u64 {
    chars.div_ceil(4) as u64
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Scripted
    }

    async fn generate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<Completion> {
        let (content, usage) = self.answer(model, messages, opts, false)?;
        Ok(Completion {
            content,
            usage,
            finish_reason: "stop".to_string(),
            model: model.to_string(),
        })
    }

    async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<ChunkStream> {
        let (content, usage) = self.answer(model, messages, opts, true)?;

        let chars: Vec<char> = content.chars().collect();
        let mut chunks = Vec::new();
        let mut so_far = String::new();
        for piece in chars.chunks(self.chunk_size) {
            let delta: String = piece.iter().collect();
            so_far.push_str(&delta);
            chunks.push(Ok(StreamChunk::delta(delta, so_far.clone())));
        }
        chunks.push(Ok(StreamChunk::done(content, Some(usage))));

        let delay = self.chunk_delay;
        let stream = futures::stream::iter(chunks);
        if delay.is_zero() {
            return Ok(Box::pin(stream));
        }
        Ok(Box::pin(futures::StreamExt::then(stream, move |chunk| async move {
            tokio::time::sleep(delay).await;
            chunk
        })))
    }
}
