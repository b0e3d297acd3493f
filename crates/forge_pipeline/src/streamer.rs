//! Character-level code streaming.
//!
//! Turns finished file content into the `code_*` event sequence a live
//! editor replays. Delays come from a [`Pacer`]; every delay observes the
//! cancel token.

use std::sync::Arc;

use forge_core::{pause, CancellationToken, Event, EventBus, EventType, Pacer};
use serde_json::json;
use tracing::debug;

/// A `code_chunk_written` event accompanies every N characters.
pub const CHUNK_EVERY: usize = 10;

/// How a streaming run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    pub written: usize,
    pub total: usize,
    pub cancelled: bool,
}

/// Replays content one character at a time through the event bus.
#[derive(Clone)]
pub struct CodeStreamer {
    bus: EventBus,
    pacer: Arc<dyn Pacer>,
}

impl CodeStreamer {
    pub fn new(bus: EventBus, pacer: Arc<dyn Pacer>) -> Self {
        Self { bus, pacer }
    }

    /// Stream `content` for `path`.
    ///
    /// Emits `code_streaming_started`, one `code_character_written` per
    /// character (plus a `code_chunk_written` every [`CHUNK_EVERY`]) and
    /// exactly one `code_streaming_complete`.
    pub async fn stream(&self, path: &str, content: &str, cancel: &CancellationToken) -> StreamOutcome {
        let total = content.chars().count();
        debug!("Streaming {} ({} chars)", path, total);
        self.bus.emit(
            Event::new(EventType::CodeStreamingStarted, format!("Writing {}", path))
                .with_data(json!({ "path": path, "total": total })),
        );

        let mut so_far = String::with_capacity(content.len());
        let mut line = 1u32;
        let mut column = 1u32;
        let mut written = 0usize;

        for (index, character) in content.chars().enumerate() {
            if cancel.is_cancelled() {
                return self.complete(path, written, total, true);
            }

            so_far.push(character);
            written = index + 1;
            let progress = ((written as f64 / total as f64) * 1000.0).round() / 10.0;
            let data = json!({
                "path": path,
                "content_so_far": so_far,
                "character": character.to_string(),
                "char_index": index,
                "total": total,
                "line": line,
                "column": column,
                "progress_pct": progress,
            });

            if written % CHUNK_EVERY == 0 {
                self.bus.emit(Event::new(EventType::CodeCharacterWritten, "").with_data(data.clone()));
                self.bus.emit(Event::new(EventType::CodeChunkWritten, "").with_data(data));
            } else {
                self.bus.emit(Event::new(EventType::CodeCharacterWritten, "").with_data(data));
            }

            if character == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }

            if pause(self.pacer.delay_for(character), cancel).await.is_err() {
                return self.complete(path, written, total, true);
            }
        }

        self.complete(path, written, total, false)
    }

    fn complete(&self, path: &str, written: usize, total: usize, cancelled: bool) -> StreamOutcome {
        let message = if cancelled {
            format!("Stopped writing {}", path)
        } else {
            format!("Finished writing {}", path)
        };
        self.bus.emit(
            Event::new(EventType::CodeStreamingComplete, message).with_data(json!({
                "path": path,
                "written": written,
                "total": total,
                "cancelled": cancelled,
                "typing": false,
            })),
        );
        StreamOutcome {
            written,
            total,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{EventFilter, InstantPacer};
    use std::time::Duration;

    fn streamer(bus: &EventBus) -> CodeStreamer {
        CodeStreamer::new(bus.clone(), Arc::new(InstantPacer))
    }

    #[tokio::test]
    async fn test_event_sequence_and_positions() {
        let bus = EventBus::new();
        let outcome = streamer(&bus)
            .stream("a.txt", "ab\ncdefghijk", &CancellationToken::new())
            .await;
        assert_eq!(outcome, StreamOutcome { written: 12, total: 12, cancelled: false });

        let events = bus.history();
        assert_eq!(events[0].event_type, EventType::CodeStreamingStarted);
        assert_eq!(events.last().map(|e| e.event_type), Some(EventType::CodeStreamingComplete));

        let chars = bus.events_of(EventType::CodeCharacterWritten);
        assert_eq!(chars.len(), 12);
        let indices: Vec<u64> = chars.iter().map(|e| e.data["char_index"].as_u64().unwrap()).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));

        // 'c' is the first character of line 2.
        assert_eq!(chars[3].data["character"], "c");
        assert_eq!(chars[3].data["line"], 2);
        assert_eq!(chars[3].data["column"], 1);
        assert_eq!(chars[11].data["content_so_far"], "ab\ncdefghijk");
        assert_eq!(chars[11].data["progress_pct"], 100.0);

        let chunks = bus.events_of(EventType::CodeChunkWritten);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data["char_index"], 9);
    }

    #[tokio::test]
    async fn test_empty_content() {
        let bus = EventBus::new();
        let outcome = streamer(&bus).stream("empty.md", "", &CancellationToken::new()).await;
        assert_eq!(outcome.total, 0);
        assert!(!outcome.cancelled);
        assert_eq!(bus.history().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_emits_single_cancelled_completion() {
        struct SlowPacer;
        impl Pacer for SlowPacer {
            fn delay_for(&self, _c: char) -> Duration {
                Duration::from_secs(30)
            }
        }

        let bus = EventBus::new();
        let sub = bus.subscribe(EventFilter::all().types([EventType::CodeCharacterWritten]));
        let cancel = CancellationToken::new();
        let streamer = CodeStreamer::new(bus.clone(), Arc::new(SlowPacer));

        let token = cancel.clone();
        let task = tokio::spawn(async move { streamer.stream("lib/main.dart", "void main() {}", &token).await });
        assert!(sub.recv().await.is_some());
        cancel.cancel();

        let outcome = task.await.unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.written, 1);

        let complete = bus.events_of(EventType::CodeStreamingComplete);
        assert_eq!(complete.len(), 1);
        assert!(complete[0].flag("cancelled"));
    }
}
