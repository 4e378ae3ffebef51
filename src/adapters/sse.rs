//! Server-sent-event codec for the upstream event protocol.
//!
//! Framing is `event: <type>\ndata: <json>\n\n`, UTF-8, one blank line
//! between frames. The decoder is incremental: chunks may split frames
//! anywhere, including inside a multi-byte UTF-8 sequence, so bytes are
//! buffered until a full frame is available. Unknown event types decode
//! to `None` so upstream additions pass through harmlessly.

use thiserror::Error;
use tracing::debug;

use crate::domain::events::{AgentComplete, AgentStart, StreamError, StreamEvent};
use crate::domain::wire::OrchestrateResponse;

/// The synthetic frame emitted when the upstream connection cannot be
/// established. Kept as a literal: downstream consumers match it
/// byte-for-byte.
pub const BACKEND_UNREACHABLE_FRAME: &str =
    "event: error\ndata: {\"message\": \"Backend not reachable\"}\n\n";

/// Encode one SSE frame.
pub fn encode_frame(event: &str, data: &str) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

/// A decoded-but-uninterpreted frame: event name plus joined data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Failure to interpret a frame that claimed a known event type.
#[derive(Debug, Error)]
pub enum SseError {
    #[error("malformed '{event}' payload: {source}")]
    BadPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Incremental frame decoder over a chunked byte stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, draining every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&raw[..end]) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parse the lines of one frame. Frames with no data lines (comments,
/// keep-alives) are dropped.
fn parse_frame(raw: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(raw);

    let mut event = String::from("message");
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = field_value(line, "event") {
            event = value.to_string();
        } else if let Some(value) = field_value(line, "data") {
            data_lines.push(value);
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// `field: value` with at most one leading space stripped from the value.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Interpret a frame against the known event vocabulary.
///
/// `Ok(None)` means the event type is unknown and should be skipped;
/// `Err` means a known type carried an unreadable payload, which the
/// coordinator treats as a protocol violation.
pub fn decode_event(frame: &SseFrame) -> Result<Option<StreamEvent>, SseError> {
    let bad = |source| SseError::BadPayload {
        event: frame.event.clone(),
        source,
    };

    let event = match frame.event.as_str() {
        "agent_start" => {
            let payload: AgentStart = serde_json::from_str(&frame.data).map_err(bad)?;
            StreamEvent::AgentStart(payload)
        }
        "agent_complete" => {
            let payload: AgentComplete = serde_json::from_str(&frame.data).map_err(bad)?;
            StreamEvent::AgentComplete(payload)
        }
        "complete" => {
            let payload: OrchestrateResponse = serde_json::from_str(&frame.data).map_err(bad)?;
            StreamEvent::Complete(payload)
        }
        "error" => {
            let payload: StreamError = serde_json::from_str(&frame.data).map_err(bad)?;
            StreamEvent::Error(payload)
        }
        other => {
            debug!(event = other, "ignoring unknown stream event type");
            return Ok(None);
        }
    };

    Ok(Some(event))
}
