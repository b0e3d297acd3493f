//! Provider client contract.

use async_trait::async_trait;

use crate::catalog::ProviderKind;
use crate::error::LlmResult;
use crate::types::{ChatMessage, ChunkStream, Completion, GenerateOptions};

/// One vendor's chat API.
///
/// Clients are shared across sessions and hold no conversation state, so
/// every call carries the full message list.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Run a call to completion.
    async fn generate(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<Completion>;

    /// Stream deltas; the last item has `done` set.
    async fn stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        opts: &GenerateOptions,
    ) -> LlmResult<ChunkStream>;
}
