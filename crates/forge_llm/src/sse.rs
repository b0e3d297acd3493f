//! Server-sent event decoding shared by the HTTP clients.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::types::{ChunkStream, StreamChunk, Usage};

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// What a vendor-specific handler makes of one event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseAction {
    Delta(String),
    /// Partial usage; non-zero fields overwrite what is known.
    Usage(Usage),
    Done,
}

/// Pop one complete event off the buffer. Events end with a blank line.
pub fn extract_event(buffer: &mut String) -> Option<String> {
    let pos = buffer.find("\n\n")?;
    let event = buffer[..pos].to_string();
    buffer.drain(..pos + 2);
    Some(event)
}

/// Parse the `event:` and `data:` lines of one event. Multiple data lines are
/// joined with newlines; comment-only events yield `None`.
pub fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Turn an SSE response body into a chunk stream.
///
/// A background task reads the body, hands every event to `handler` and
/// accumulates the text. The stream always ends with a `done` chunk unless
/// an error is sent first.
pub fn spawn_chunk_stream<F>(response: reqwest::Response, mut handler: F) -> ChunkStream
where
    F: FnMut(&SseEvent) -> LlmResult<Vec<SseAction>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<LlmResult<StreamChunk>>(100);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();
        let mut usage: Option<Usage> = None;

        while let Some(bytes) = body.next().await {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Network(e.to_string()))).await;
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes).replace("\r\n", "\n"));

            while let Some(raw) = extract_event(&mut buffer) {
                let Some(event) = parse_event(&raw) else {
                    continue;
                };
                let actions = match handler(&event) {
                    Ok(actions) => actions,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
                for action in actions {
                    match action {
                        SseAction::Delta(text) => {
                            if text.is_empty() {
                                continue;
                            }
                            content.push_str(&text);
                            if tx.send(Ok(StreamChunk::delta(text, content.clone()))).await.is_err() {
                                debug!("Stream receiver dropped");
                                return;
                            }
                        }
                        SseAction::Usage(partial) => {
                            let known = usage.get_or_insert_with(Usage::default);
                            if partial.input_tokens > 0 {
                                known.input_tokens = partial.input_tokens;
                            }
                            if partial.output_tokens > 0 {
                                known.output_tokens = partial.output_tokens;
                            }
                        }
                        SseAction::Done => {
                            let _ = tx.send(Ok(StreamChunk::done(content, usage))).await;
                            return;
                        }
                    }
                }
            }
        }

        let _ = tx.send(Ok(StreamChunk::done(content, usage))).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_waits_for_blank_line() {
        let mut buffer = String::from("data: {\"a\":1}\n");
        assert!(extract_event(&mut buffer).is_none());

        buffer.push_str("\ndata: [DONE]\n\n");
        assert_eq!(extract_event(&mut buffer).as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(extract_event(&mut buffer).as_deref(), Some("data: [DONE]"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_event_with_type() {
        let event = parse_event("event: content_block_delta\ndata: {\"x\":true}").unwrap();
        assert_eq!(event.event.as_deref(), Some("content_block_delta"));
        assert_eq!(event.data, "{\"x\":true}");
    }

    #[test]
    fn test_parse_event_ignores_comments() {
        assert!(parse_event(": keep-alive").is_none());
        let joined = parse_event("data: one\ndata: two").unwrap();
        assert_eq!(joined.data, "one\ntwo");
        assert!(joined.event.is_none());
    }
}
