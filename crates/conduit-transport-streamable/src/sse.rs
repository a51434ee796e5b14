//! Pure, no-I/O Server-Sent Events encoding and decoding for the GET stream
//! of the streamable HTTP transport.
//!
//! Wire shape per event: `id: <event_id>\nevent: message\ndata:
//! <serialized envelope>\n\n`. A priming event carries only `id` (and
//! optionally `retry`), no `data`.

/// One SSE frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    pub retry: Option<u32>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self { id: None, event: None, data: data.into(), retry: None }
    }

    pub fn with_id(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self { id: Some(id.into()), event: Some("message".into()), data: data.into(), retry: None }
    }

    /// A priming event: carries an id but no payload, used solely to seed
    /// resumption state for a client that hasn't received a real event yet.
    pub fn priming(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), event: None, data: String::new(), retry: None }
    }

    pub fn with_retry(mut self, retry_ms: u32) -> Self {
        self.retry = Some(retry_ms);
        self
    }
}

/// Stateless encode from an [`SseEvent`] to wire bytes.
pub fn encode(event: &SseEvent) -> String {
    let mut out = String::new();
    if let Some(id) = &event.id {
        out.push_str("id: ");
        out.push_str(id);
        out.push('\n');
    }
    if let Some(kind) = &event.event {
        out.push_str("event: ");
        out.push_str(kind);
        out.push('\n');
    }
    if let Some(retry) = event.retry {
        out.push_str("retry: ");
        out.push_str(&retry.to_string());
        out.push('\n');
    }
    if event.id.is_none() || !event.data.is_empty() {
        for line in event.data.lines() {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

/// A comment frame (`:` prefix), used for keepalive pings that don't disturb
/// `Last-Event-Id` resumption state.
pub fn encode_keepalive() -> String {
    ":keepalive\n\n".to_string()
}

/// Incremental parser for the client side of the GET stream: feed raw chunks
/// as they arrive over the wire, get back however many complete events they
/// contained.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
    retry: Option<u32>,
    saw_any_field: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=pos);
            if line.is_empty() {
                if let Some(ev) = self.emit() {
                    events.push(ev);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            self.saw_any_field = true;
            let (field, value) = match line.find(':') {
                Some(colon) => (&line[..colon], line[colon + 1..].trim_start()),
                None => (line.as_str(), ""),
            };
            match field {
                "id" => self.id = Some(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                "retry" => {
                    if let Ok(ms) = value.parse() {
                        self.retry = Some(ms);
                    }
                }
                _ => {}
            }
        }
        events
    }

    fn emit(&mut self) -> Option<SseEvent> {
        if !self.saw_any_field {
            return None;
        }
        let event = SseEvent {
            id: self.id.take(),
            event: self.event.take(),
            data: self.data.join("\n"),
            retry: self.retry.take(),
        };
        self.data.clear();
        self.saw_any_field = false;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_message_event_has_three_fields() {
        let event = SseEvent::with_id("5", "{\"jsonrpc\":\"2.0\"}");
        let wire = encode(&event);
        assert_eq!(wire, "id: 5\nevent: message\ndata: {\"jsonrpc\":\"2.0\"}\n\n");
    }

    #[test]
    fn encode_priming_event_omits_data_field() {
        let event = SseEvent::priming("1").with_retry(2000);
        let wire = encode(&event);
        assert_eq!(wire, "id: 1\nretry: 2000\n\n");
    }

    #[test]
    fn parser_round_trips_a_single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed("id: 9\nevent: message\ndata: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("9"));
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn parser_handles_events_split_across_feed_calls() {
        let mut parser = SseParser::new();
        assert!(parser.feed("id: 1\nda").is_empty());
        let events = parser.feed("ta: partial\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn parser_ignores_comment_lines() {
        let mut parser = SseParser::new();
        let events = parser.feed(":keepalive\n\nid: 1\ndata: x\n\n");
        assert_eq!(events.len(), 1);
    }
}
