//! Event bus: the single channel through which the core communicates.
//!
//! Every observable effect of the orchestrator is an [`Event`]. Events are
//! appended to a bounded history and delivered to subscribers in emission
//! order. The producer never blocks on a subscriber:
//!
//! - Each subscriber owns a bounded buffer. When it is full, the oldest
//!   non-critical event is dropped. Critical events (`error`,
//!   `file_created`, `done`) are never dropped.
//! - A subscriber that stays over capacity for longer than the stall
//!   timeout, or reaches twice its capacity, is disconnected and an
//!   `internal` event records the drop.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{trace, warn};

/// Closed set of event types the core emits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Thought,
    ThoughtInternal,
    Analysis,
    Plan,
    Todo,
    Decision,
    FileAnnounced,
    FileOpenedInEditor,
    CodeStreamingStarted,
    CodeCharacterWritten,
    CodeChunkWritten,
    CodeStreamingComplete,
    FileCreated,
    FileModified,
    FolderCreated,
    Terminal,
    TerminalOutput,
    Git,
    Preview,
    ErrorDetected,
    ErrorFixStarted,
    ErrorFixed,
    SyntaxErrorDetected,
    Done,
    Error,
    /// Types written by a newer producer. Never emitted by the core.
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thought => "thought",
            Self::ThoughtInternal => "thought_internal",
            Self::Analysis => "analysis",
            Self::Plan => "plan",
            Self::Todo => "todo",
            Self::Decision => "decision",
            Self::FileAnnounced => "file_announced",
            Self::FileOpenedInEditor => "file_opened_in_editor",
            Self::CodeStreamingStarted => "code_streaming_started",
            Self::CodeCharacterWritten => "code_character_written",
            Self::CodeChunkWritten => "code_chunk_written",
            Self::CodeStreamingComplete => "code_streaming_complete",
            Self::FileCreated => "file_created",
            Self::FileModified => "file_modified",
            Self::FolderCreated => "folder_created",
            Self::Terminal => "terminal",
            Self::TerminalOutput => "terminal_output",
            Self::Git => "git",
            Self::Preview => "preview",
            Self::ErrorDetected => "error_detected",
            Self::ErrorFixStarted => "error_fix_started",
            Self::ErrorFixed => "error_fixed",
            Self::SyntaxErrorDetected => "syntax_error_detected",
            Self::Done => "done",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Events that overflow handling must never drop.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Error | Self::FileCreated | Self::Done)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visibility of an event. Ordered from most to least visible.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    #[default]
    Public,
    Internal,
    Debug,
}

/// A typed, scoped, append-only message from the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub scope: EventScope,
    pub timestamp_ms: i64,
    /// Position in the session's emission order, assigned by the bus.
    #[serde(default)]
    pub seq: u64,
}

impl Event {
    /// Create a public event.
    pub fn new(event_type: EventType, message: impl Into<String>) -> Self {
        Self {
            event_type,
            message: message.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            scope: EventScope::Public,
            timestamp_ms: Utc::now().timestamp_millis(),
            seq: 0,
        }
    }

    pub fn internal(mut self) -> Self {
        self.scope = EventScope::Internal;
        self
    }

    pub fn debug(mut self) -> Self {
        self.scope = EventScope::Debug;
        self
    }

    /// Replace the payload. Non-object values are wrapped under `value`.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = match data {
            serde_json::Value::Object(_) => data,
            other => serde_json::json!({ "value": other }),
        };
        self
    }

    /// Set a single payload field.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.data.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// The `path` payload field, present on all file lifecycle events.
    pub fn path(&self) -> Option<&str> {
        self.data.get("path").and_then(|v| v.as_str())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.data.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

/// Selects events by type set and scope floor.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// `None` accepts every type.
    pub types: Option<HashSet<EventType>>,
    /// Least visible scope delivered (`Public` only sees public events).
    pub max_scope: EventScope,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::public()
    }
}

impl EventFilter {
    /// Every event, every scope.
    pub fn all() -> Self {
        Self {
            types: None,
            max_scope: EventScope::Debug,
        }
    }

    /// Every public event.
    pub fn public() -> Self {
        Self {
            types: None,
            max_scope: EventScope::Public,
        }
    }

    pub fn scope(mut self, max_scope: EventScope) -> Self {
        self.max_scope = max_scope;
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        event.scope <= self.max_scope
            && self
                .types
                .as_ref()
                .map_or(true, |t| t.contains(&event.event_type))
    }
}

/// Tuning for the bus.
#[derive(Debug, Clone)]
pub struct BusOptions {
    /// Events kept in the bus history.
    pub history_capacity: usize,
    /// Buffered events per subscriber before overflow handling starts.
    pub subscriber_capacity: usize,
    /// How long a subscriber may stay over capacity before it is dropped.
    pub stall_timeout: Duration,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            history_capacity: 10_000,
            subscriber_capacity: 1024,
            stall_timeout: Duration::from_secs(2),
        }
    }
}

struct SubscriberQueue {
    buffer: Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SubscriberQueue {
    fn new() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Push with the overflow policy. Returns the buffer length afterwards.
    fn push(&self, event: Event, capacity: usize) -> usize {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= capacity {
            if let Some(pos) = buffer.iter().position(|e| !e.event_type.is_critical()) {
                buffer.remove(pos);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            } else if !event.event_type.is_critical() {
                // Everything buffered is critical; the incoming event is the oldest droppable one.
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return buffer.len();
            }
        }
        buffer.push_back(event);
        let len = buffer.len();
        drop(buffer);
        self.notify.notify_one();
        len
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

struct SubscriberSlot {
    id: u64,
    filter: EventFilter,
    queue: Arc<SubscriberQueue>,
    over_capacity_since: Option<Instant>,
}

struct BusInner {
    seq: u64,
    next_subscriber: u64,
    history: VecDeque<Event>,
    subscribers: Vec<SubscriberSlot>,
}

/// Shared, cloneable event bus. Writes are serialized under a single lock.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    options: Arc<BusOptions>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_options(BusOptions::default())
    }

    pub fn with_options(options: BusOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                seq: 0,
                next_subscriber: 1,
                history: VecDeque::new(),
                subscribers: Vec::new(),
            })),
            options: Arc::new(options),
        }
    }

    /// Register a subscriber.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let queue = Arc::new(SubscriberQueue::new());
        let mut inner = self.inner.lock();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push(SubscriberSlot {
            id,
            filter,
            queue: Arc::clone(&queue),
            over_capacity_since: None,
        });
        Subscription { id, queue }
    }

    /// Append an event and deliver it to matching subscribers.
    ///
    /// Returns the event as recorded (with its sequence number).
    pub fn emit(&self, mut event: Event) -> Event {
        let mut inner = self.inner.lock();
        inner.seq += 1;
        event.seq = inner.seq;
        trace!(seq = event.seq, event_type = %event.event_type, "emit");

        self.record(&mut inner, event.clone());

        let capacity = self.options.subscriber_capacity.max(1);
        let now = Instant::now();
        let mut disconnected = Vec::new();

        for slot in inner.subscribers.iter_mut() {
            if slot.queue.closed.load(Ordering::SeqCst) {
                disconnected.push((slot.id, false));
                continue;
            }
            if !slot.filter.matches(&event) {
                continue;
            }
            let len = slot.queue.push(event.clone(), capacity);
            if len > capacity {
                let since = *slot.over_capacity_since.get_or_insert(now);
                if now.duration_since(since) > self.options.stall_timeout || len >= capacity * 2 {
                    disconnected.push((slot.id, true));
                }
            } else {
                slot.over_capacity_since = None;
            }
        }

        if !disconnected.is_empty() {
            for (id, stalled) in &disconnected {
                if let Some(slot) = inner.subscribers.iter().find(|s| s.id == *id) {
                    slot.queue.close();
                }
                if *stalled {
                    warn!(subscriber = id, "Disconnecting stalled event subscriber");
                }
            }
            inner
                .subscribers
                .retain(|s| !disconnected.iter().any(|(id, _)| *id == s.id));

            for (id, _) in disconnected.iter().filter(|(_, stalled)| *stalled) {
                inner.seq += 1;
                let mut notice = Event::new(EventType::ThoughtInternal, "Subscriber disconnected after stalling")
                    .internal()
                    .with("subscriber", *id)
                    .with("reason", "backpressure");
                notice.seq = inner.seq;
                self.record(&mut inner, notice.clone());
                for slot in inner.subscribers.iter() {
                    if slot.filter.matches(&notice) {
                        slot.queue.push(notice.clone(), capacity);
                    }
                }
            }
        }

        event
    }

    fn record(&self, inner: &mut BusInner, event: Event) {
        inner.history.push_back(event);
        while inner.history.len() > self.options.history_capacity {
            inner.history.pop_front();
        }
    }

    /// Full retained history, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// The last `n` events, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Event> {
        let inner = self.inner.lock();
        let skip = inner.history.len().saturating_sub(n);
        inner.history.iter().skip(skip).cloned().collect()
    }

    /// Retained events of one type.
    pub fn events_of(&self, event_type: EventType) -> Vec<Event> {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Seed the history from persisted events (used on resume).
    pub fn restore_history(&self, events: Vec<Event>) {
        let mut inner = self.inner.lock();
        inner.seq = events.iter().map(|e| e.seq).max().unwrap_or(0);
        inner.history = events.into_iter().collect();
        while inner.history.len() > self.options.history_capacity {
            inner.history.pop_front();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Number of events emitted so far.
    pub fn last_seq(&self) -> u64 {
        self.inner.lock().seq
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("seq", &inner.seq)
            .field("history", &inner.history.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// Receiving half of a bus subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` once the subscription is disconnected
    /// and its buffer drained.
    pub async fn recv(&self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.buffer.lock().pop_front() {
                return Some(event);
            }
            if self.queue.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.queue.buffer.lock().pop_front()
    }

    /// Take everything currently buffered.
    pub fn drain(&self) -> Vec<Event> {
        self.queue.buffer.lock().drain(..).collect()
    }

    pub fn is_disconnected(&self) -> bool {
        self.queue.closed.load(Ordering::SeqCst)
    }

    /// Events dropped by the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_assigns_sequence_and_records_history() {
        let bus = EventBus::new();
        bus.emit(Event::new(EventType::Thought, "one"));
        let second = bus.emit(Event::new(EventType::Thought, "two"));

        assert_eq!(second.seq, 2);
        assert_eq!(bus.history().len(), 2);
        assert_eq!(bus.tail(1)[0].message, "two");
    }

    #[test]
    fn test_filter_by_scope_and_type() {
        let bus = EventBus::new();
        let public = bus.subscribe(EventFilter::public());
        let files = bus.subscribe(EventFilter::all().types([EventType::FileCreated]));

        bus.emit(Event::new(EventType::Thought, "visible"));
        bus.emit(Event::new(EventType::ThoughtInternal, "hidden").internal());
        bus.emit(Event::new(EventType::FileCreated, "created").with("path", "a.txt"));

        let public_events = public.drain();
        assert_eq!(public_events.len(), 2);
        assert!(public_events.iter().all(|e| e.scope == EventScope::Public));

        let file_events = files.drain();
        assert_eq!(file_events.len(), 1);
        assert_eq!(file_events[0].path(), Some("a.txt"));
    }

    #[test]
    fn test_overflow_drops_oldest_non_critical() {
        let bus = EventBus::with_options(BusOptions {
            subscriber_capacity: 3,
            stall_timeout: Duration::from_secs(60),
            ..BusOptions::default()
        });
        let sub = bus.subscribe(EventFilter::all());

        bus.emit(Event::new(EventType::Thought, "t1"));
        bus.emit(Event::new(EventType::FileCreated, "f1"));
        bus.emit(Event::new(EventType::Thought, "t2"));
        bus.emit(Event::new(EventType::Thought, "t3"));

        let received: Vec<String> = sub.drain().into_iter().map(|e| e.message).collect();
        assert_eq!(received, vec!["f1", "t2", "t3"]);
        assert_eq!(sub.dropped(), 1);
    }

    #[test]
    fn test_critical_events_are_never_dropped() {
        let bus = EventBus::with_options(BusOptions {
            subscriber_capacity: 2,
            stall_timeout: Duration::from_secs(60),
            ..BusOptions::default()
        });
        let sub = bus.subscribe(EventFilter::all());

        bus.emit(Event::new(EventType::FileCreated, "f1"));
        bus.emit(Event::new(EventType::Error, "e1"));
        bus.emit(Event::new(EventType::Thought, "dropped"));
        bus.emit(Event::new(EventType::Done, "done"));

        let received: Vec<String> = sub.drain().into_iter().map(|e| e.message).collect();
        assert_eq!(received, vec!["f1", "e1", "done"]);
    }

    #[test]
    fn test_stalled_subscriber_is_disconnected() {
        let bus = EventBus::with_options(BusOptions {
            subscriber_capacity: 1,
            stall_timeout: Duration::from_secs(60),
            ..BusOptions::default()
        });
        let stalled = bus.subscribe(EventFilter::all().types([EventType::Done]));
        let observer = bus.subscribe(EventFilter::all().types([EventType::ThoughtInternal]));

        bus.emit(Event::new(EventType::Done, "d1"));
        bus.emit(Event::new(EventType::Done, "d2"));

        assert!(stalled.is_disconnected());
        assert_eq!(bus.subscriber_count(), 1);
        let notices = observer.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].scope, EventScope::Internal);
    }

    #[tokio::test]
    async fn test_recv_waits_for_emit() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventFilter::all());
        let producer = bus.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.emit(Event::new(EventType::Done, "finished"));
        });

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Done);
        handle.await.unwrap();
    }

    #[test]
    fn test_unknown_type_deserializes() {
        let json = r#"{"type":"future_event","message":"m","data":{},"scope":"public","timestamp_ms":1}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::Unknown);
    }

    #[test]
    fn test_dropped_subscription_is_removed() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventFilter::all());
        drop(sub);
        bus.emit(Event::new(EventType::Thought, "x"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
