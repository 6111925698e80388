//! Incremental decoder for the line-delimited reply stream.
//!
//! Each line is one record: `{"type":"token","content":...}`,
//! `{"type":"done"}` or `{"type":"error","error":...}`. Lines that are not
//! JSON at all are passed through as literal text so backends that stream
//! plain text without an envelope still produce output. JSON lines that are
//! not records (heartbeats, unknown shapes) are ignored.

use memchr::memchr;
use serde_json::Value;
use tracing::debug;

use crate::api::StreamRecord;

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text, in arrival order.
    Token(String),
    /// The reply is complete. Carries the full accumulated text when known.
    Complete(Option<String>),
    /// The backend reported an error mid-stream.
    Failure(String),
}

/// Turns arbitrarily split byte chunks into [`StreamEvent`]s.
///
/// Records are only decoded once their terminating newline has arrived, so
/// the output does not depend on where the transport split the bytes. Exactly
/// one terminal event is produced per stream: either one decoded from a
/// record, or one synthesized by [`StreamDecoder::finish`].
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    accumulated: String,
    raw_text_seen: bool,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events of every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(relative) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + relative;
            let line = self.buffer[start..end].to_vec();
            start = end + 1;
            self.decode_record(&line, true, &mut events);
            if self.finished {
                break;
            }
        }

        if self.finished {
            self.buffer.clear();
        } else {
            self.buffer.drain(..start);
        }
        events
    }

    /// Flush the trailing partial record at end of stream and make sure a
    /// terminal event has been emitted.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let rest = std::mem::take(&mut self.buffer);
        self.decode_record(&rest, false, &mut events);

        if !self.finished {
            self.finished = true;
            events.push(StreamEvent::Complete(Some(self.accumulated.clone())));
        }
        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_record(&mut self, raw: &[u8], terminated: bool, events: &mut Vec<StreamEvent>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\r').unwrap_or(&text[..]);

        if line.trim().is_empty() {
            if terminated && self.raw_text_seen {
                self.push_token("\n".to_string(), events);
            }
            return;
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(_) => {
                self.raw_text_seen = true;
                let mut fragment = line.to_string();
                if terminated {
                    fragment.push('\n');
                }
                self.push_token(fragment, events);
                return;
            }
        };

        let is_error = value.get("type").and_then(Value::as_str) == Some("error");
        match serde_json::from_value::<StreamRecord>(value) {
            Ok(record) => self.apply_record(record, events),
            Err(err) if is_error => {
                debug!(%err, "malformed error record");
                self.finished = true;
                events.push(StreamEvent::Failure(UNKNOWN_ERROR.to_string()));
            }
            Err(err) => debug!(%err, "ignoring JSON line that is not a stream record"),
        }
    }

    fn apply_record(&mut self, record: StreamRecord, events: &mut Vec<StreamEvent>) {
        match record.kind.as_str() {
            "token" => {
                if let Some(content) = record.content.filter(|content| !content.is_empty()) {
                    self.push_token(content, events);
                }
            }
            "done" => {
                self.finished = true;
                events.push(StreamEvent::Complete(Some(self.accumulated.clone())));
            }
            "error" => {
                self.finished = true;
                let reason = record
                    .error
                    .filter(|error| !error.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                events.push(StreamEvent::Failure(reason));
            }
            other => debug!(record_type = other, "ignoring unrecognized stream record"),
        }
    }

    fn push_token(&mut self, fragment: String, events: &mut Vec<StreamEvent>) {
        self.accumulated.push_str(&fragment);
        events.push(StreamEvent::Token(fragment));
    }
}
