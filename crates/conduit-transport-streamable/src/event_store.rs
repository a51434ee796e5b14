//! Resumable event storage for the streamable HTTP transport's GET/SSE
//! stream: `append`/`lookup_stream`/`replay_after`, with a `DashMap`-backed
//! in-memory implementation suitable for a single-process server.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// A stream-scoped, durable event id assigned by the store on append;
/// doubles as the `Last-Event-Id` resumption cursor.
pub type EventId = String;

#[derive(Debug, Clone)]
struct StoredEvent {
    stream_id: String,
    /// `None` marks a priming event: it establishes the cursor without
    /// itself being replayed.
    payload: Option<String>,
    sequence: u64,
}

/// Pluggable backend for resumable SSE delivery. A session's GET stream
/// appends every outbound message; a reconnecting client supplies the last
/// id it saw via `Last-Event-Id` and the transport replays everything after
/// it before resuming live delivery.
pub trait EventStore: Send + Sync {
    /// Appends `payload` to `stream_id`, returning the newly minted event
    /// id. An empty `payload` records a priming event.
    fn append(&self, stream_id: &str, payload: Option<String>) -> EventId;

    /// Which stream an event id belongs to, if the store still has it.
    fn lookup_stream(&self, event_id: &str) -> Option<String>;

    /// Invokes `emit(event_id, payload)` for every non-priming event
    /// strictly after `event_id`, in id order, then returns the owning
    /// stream id for continued live delivery. Returns `None` if `event_id`
    /// is unknown.
    fn replay_after(&self, event_id: &str, emit: &mut dyn FnMut(&str, &str)) -> Option<String>;

    /// Drops all events for a stream (on session termination).
    fn drop_stream(&self, stream_id: &str);
}

/// In-memory [`EventStore`]. Event ids are monotonically increasing decimal
/// strings, globally unique across streams — sufficient for a
/// single-process deployment; a distributed server would back this with
/// Redis or similar and keep the same trait.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: DashMap<EventId, StoredEvent>,
    order: parking_lot::Mutex<Vec<EventId>>,
    counter: AtomicU64,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, stream_id: &str, payload: Option<String>) -> EventId {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = sequence.to_string();
        self.events.insert(
            id.clone(),
            StoredEvent { stream_id: stream_id.to_string(), payload, sequence },
        );
        self.order.lock().push(id.clone());
        id
    }

    fn lookup_stream(&self, event_id: &str) -> Option<String> {
        self.events.get(event_id).map(|e| e.stream_id.clone())
    }

    fn replay_after(&self, event_id: &str, emit: &mut dyn FnMut(&str, &str)) -> Option<String> {
        let cursor = self.events.get(event_id)?;
        let stream_id = cursor.stream_id.clone();
        let cursor_sequence = cursor.sequence;
        drop(cursor);

        let order = self.order.lock();
        for id in order.iter() {
            let Some(stored) = self.events.get(id) else { continue };
            if stored.stream_id != stream_id || stored.sequence <= cursor_sequence {
                continue;
            }
            if let Some(payload) = &stored.payload {
                emit(id, payload);
            }
        }
        Some(stream_id)
    }

    fn drop_stream(&self, stream_id: &str) {
        let mut order = self.order.lock();
        order.retain(|id| self.events.get(id).map(|e| e.stream_id != stream_id).unwrap_or(true));
        self.events.retain(|_, e| e.stream_id != stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_after_skips_priming_events_and_the_cursor_itself() {
        let store = InMemoryEventStore::new();
        let prime = store.append("s1", None);
        let e1 = store.append("s1", Some("one".into()));
        let e2 = store.append("s1", Some("two".into()));

        let mut seen = Vec::new();
        let stream = store.replay_after(&prime, &mut |id, data| seen.push((id.to_string(), data.to_string())));

        assert_eq!(stream.as_deref(), Some("s1"));
        assert_eq!(seen, vec![(e1, "one".to_string()), (e2, "two".to_string())]);
    }

    #[test]
    fn replay_after_unknown_cursor_returns_none() {
        let store = InMemoryEventStore::new();
        let mut seen = Vec::new();
        assert!(store.replay_after("missing", &mut |_, _| seen.push(())).is_none());
    }

    #[test]
    fn replay_after_is_exclusive_of_the_cursor() {
        let store = InMemoryEventStore::new();
        let e1 = store.append("s1", Some("one".into()));
        let e2 = store.append("s1", Some("two".into()));

        let mut seen = Vec::new();
        store.replay_after(&e1, &mut |id, _| seen.push(id.to_string()));
        assert_eq!(seen, vec![e2]);
    }

    #[test]
    fn events_from_other_streams_are_not_replayed() {
        let store = InMemoryEventStore::new();
        let prime = store.append("s1", None);
        store.append("s2", Some("other-stream".into()));

        let mut seen = Vec::new();
        store.replay_after(&prime, &mut |_, data| seen.push(data.to_string()));
        assert!(seen.is_empty());
    }

    #[test]
    fn drop_stream_removes_its_events_but_keeps_others() {
        let store = InMemoryEventStore::new();
        let prime = store.append("s1", None);
        store.append("s1", Some("gone".into()));
        let e2 = store.append("s2", Some("stays".into()));

        store.drop_stream("s1");
        assert!(store.lookup_stream(&prime).is_none());
        assert!(store.lookup_stream(&e2).is_some());
    }
}
