//! Dialog skill: answers conversational turns as `thought` events.

use forge_core::{CancellationToken, Event, EventBus, EventType};
use forge_llm::{ChatMessage, LlmError, ModelRouter, TaskType};
use forge_pipeline::ModelSettings;
use forge_templates::dialog_system_prompt;
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{KernelError, KernelResult};

/// Reply used when no model can answer.
pub const OFFLINE_REPLY: &str = "Hi! Describe the app you want, for example \"create a flutter todo app\", \
and I will plan it and write it file by file.";

/// Streams a model reply to the bus, or a canned one when offline.
pub struct DialogSkill<'a> {
    router: &'a ModelRouter,
    bus: &'a EventBus,
    settings: ModelSettings,
}

impl<'a> DialogSkill<'a> {
    pub fn new(router: &'a ModelRouter, bus: &'a EventBus, settings: ModelSettings) -> Self {
        Self { router, bus, settings }
    }

    /// Answer `turn`, emitting one `thought` per delta. Returns the full reply.
    pub async fn respond(&self, turn: &str, cancel: &CancellationToken) -> KernelResult<String> {
        if !self.router.is_online() {
            return self.canned(cancel, "no model configured");
        }
        match self.stream_reply(turn, cancel).await {
            Ok(reply) if !reply.trim().is_empty() => Ok(reply),
            Ok(_) => self.canned(cancel, "empty reply"),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => self.canned(cancel, &e.to_string()),
        }
    }

    async fn stream_reply(&self, turn: &str, cancel: &CancellationToken) -> KernelResult<String> {
        let decision = self.router.decide(TaskType::Dialog, &self.settings.request(true))?;
        let messages = [ChatMessage::system(dialog_system_prompt()), ChatMessage::user(turn)];
        let mut stream = self.router.stream_with_fallback(&decision, &messages, cancel).await?;
        debug!("Dialog reply from {}", decision.selected);

        let mut reply = String::new();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(KernelError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(LlmError::Cancelled) => return Err(KernelError::Cancelled),
                Err(e) if reply.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!("Dialog stream ended early: {}", e);
                    break;
                }
            };
            if let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) {
                reply.push_str(&delta);
                self.thought(&delta, &reply);
            }
            if chunk.done {
                break;
            }
        }
        Ok(reply)
    }

    fn canned(&self, cancel: &CancellationToken, reason: &str) -> KernelResult<String> {
        if cancel.is_cancelled() {
            return Err(KernelError::Cancelled);
        }
        debug!("Using canned dialog reply: {}", reason);
        self.bus.emit(
            Event::new(EventType::ThoughtInternal, "Answering without a model")
                .internal()
                .with("reason", reason),
        );
        let mut reply = String::new();
        for word in OFFLINE_REPLY.split_inclusive(' ') {
            reply.push_str(word);
            self.thought(word, &reply);
        }
        Ok(reply)
    }

    fn thought(&self, delta: &str, so_far: &str) {
        self.bus.emit(
            Event::new(EventType::Thought, delta).with_data(json!({
                "delta": delta,
                "content_so_far": so_far,
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_llm::{ProviderRegistry, ScriptedProvider};
    use std::sync::Arc;

    fn deltas(bus: &EventBus) -> Vec<String> {
        bus.events_of(EventType::Thought)
            .iter()
            .filter_map(|e| e.get("delta").and_then(|d| d.as_str()).map(String::from))
            .collect()
    }

    #[tokio::test]
    async fn test_offline_reply_is_streamed_as_thoughts() {
        let bus = EventBus::new();
        let router = ModelRouter::new(ProviderRegistry::with_default_catalog());
        let skill = DialogSkill::new(&router, &bus, ModelSettings::default());

        let reply = skill.respond("hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, OFFLINE_REPLY);
        let deltas = deltas(&bus);
        assert!(deltas.len() > 5);
        assert!(deltas.iter().all(|d| !d.is_empty()));
        assert_eq!(deltas.concat(), OFFLINE_REPLY);
    }

    #[tokio::test]
    async fn test_model_reply_streams_deltas() {
        let bus = EventBus::new();
        let provider = Arc::new(ScriptedProvider::with_reply("Hello there, what shall we build today?"));
        let router = ModelRouter::new(ProviderRegistry::scripted(provider.clone()));
        let skill = DialogSkill::new(&router, &bus, ModelSettings::default());

        let reply = skill.respond("hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, "Hello there, what shall we build today?");
        assert_eq!(deltas(&bus).concat(), reply);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_model_falls_back() {
        let bus = EventBus::new();
        let router = ModelRouter::new(ProviderRegistry::scripted(Arc::new(ScriptedProvider::unreachable())));
        let skill = DialogSkill::new(&router, &bus, ModelSettings::default());

        let reply = skill.respond("hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(reply, OFFLINE_REPLY);
        assert!(!bus.events_of(EventType::ThoughtInternal).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_reply() {
        let bus = EventBus::new();
        let router = ModelRouter::new(ProviderRegistry::with_default_catalog());
        let skill = DialogSkill::new(&router, &bus, ModelSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(skill.respond("hello", &cancel).await, Err(KernelError::Cancelled)));
    }
}
