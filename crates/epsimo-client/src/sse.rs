//! Server-sent event decoding for the run stream.
//!
//! `POST /runs/stream` answers with an event stream:
//!
//! ```text
//! event: metadata
//! data: {"run_id": "..."}
//!
//! event: data
//! data: [{"id": "...", "type": "ai", "content": "..."}]
//!
//! event: end
//! ```

use serde::Deserialize;

use epsimo_core::{Message, RunId};

/// A single decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (`message` when the frame carries none).
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Bytes may be fed in arbitrary chunks; complete frames are returned as soon
/// as their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush a trailing frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end().to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// Typed event of the run stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run started; carries its id.
    Metadata {
        /// Run identity, used for feedback.
        run_id: RunId,
    },
    /// Current snapshot of messages produced by the run.
    Messages(Vec<Message>),
    /// The server reported a failure.
    Error(String),
    /// The stream finished.
    End,
}

#[derive(Deserialize)]
struct MetadataPayload {
    run_id: RunId,
}

impl RunEvent {
    /// Interpret a frame. Unknown events yield `None`.
    ///
    /// # Errors
    ///
    /// Returns the decoding error message if a known event carries an
    /// unreadable payload.
    pub fn from_frame(frame: &SseFrame) -> Option<Result<Self, String>> {
        match frame.event.as_str() {
            "metadata" => Some(
                serde_json::from_str::<MetadataPayload>(&frame.data)
                    .map(|m| Self::Metadata { run_id: m.run_id })
                    .map_err(|e| format!("invalid metadata event: {e}")),
            ),
            "data" => Some(
                serde_json::from_str::<Vec<Message>>(&frame.data)
                    .map(Self::Messages)
                    .map_err(|e| format!("invalid data event: {e}")),
            ),
            "error" => Some(Ok(Self::Error(error_text(&frame.data)))),
            "end" => Some(Ok(Self::End)),
            _ => None,
        }
    }
}

/// Pull a readable message out of an error payload.
fn error_text(data: &str) -> String {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return "An error has occurred. Please try again.".to_string();
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str().map(str::to_owned))
        })
        .unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_frames_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.feed(b"event: meta");
        assert!(frames.is_empty());
        frames.extend(decoder.feed(b"data\r\ndata: {\"run_id\": \"r1\"}\r\n\r\nevent: end\n\n"));

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "metadata");
        assert_eq!(frames[0].data, "{\"run_id\": \"r1\"}");
        assert_eq!(frames[1].event, "end");
        assert_eq!(frames[1].data, "");
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: a\ndata: b\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "message".into(),
                data: "a\nb".into()
            }]
        );
    }

    #[test]
    fn comments_are_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: end\n").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event, "end");
    }

    #[test]
    fn data_event_parses_messages() {
        let frame = SseFrame {
            event: "data".into(),
            data: r#"[{"id":"m1","type":"ai","content":"Hel"}]"#.into(),
        };
        match RunEvent::from_frame(&frame) {
            Some(Ok(RunEvent::Messages(msgs))) => assert_eq!(msgs[0].text(), "Hel"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn data_event_accepts_unknown_message_types() {
        let frame = SseFrame {
            event: "data".into(),
            data: r#"[{"id":"m1","type":"ToolMessageChunk","content":"42"}]"#.into(),
        };
        match RunEvent::from_frame(&frame) {
            Some(Ok(RunEvent::Messages(msgs))) => {
                assert_eq!(msgs[0].role.as_str(), "ToolMessageChunk");
                assert_eq!(msgs[0].text(), "42");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn metadata_event_parses_run_id() {
        let frame = SseFrame {
            event: "metadata".into(),
            data: r#"{"run_id":"r-42"}"#.into(),
        };
        let event = RunEvent::from_frame(&frame).unwrap().unwrap();
        assert_eq!(
            event,
            RunEvent::Metadata {
                run_id: RunId::new("r-42").unwrap()
            }
        );
    }

    #[test]
    fn error_event_extracts_detail() {
        let frame = SseFrame {
            event: "error".into(),
            data: r#"{"detail":"Not enough credits"}"#.into(),
        };
        assert_eq!(
            RunEvent::from_frame(&frame).unwrap().unwrap(),
            RunEvent::Error("Not enough credits".into())
        );
    }

    #[test]
    fn unknown_events_are_skipped() {
        let frame = SseFrame {
            event: "ping".into(),
            data: String::new(),
        };
        assert!(RunEvent::from_frame(&frame).is_none());
    }

    #[test]
    fn malformed_data_is_an_error() {
        let frame = SseFrame {
            event: "data".into(),
            data: "not json".into(),
        };
        assert!(RunEvent::from_frame(&frame).unwrap().is_err());
    }
}
