//! Server-Sent Events decoding for streamed runs.
//!
//! Frames are separated by a blank line and carry an `event:` name plus one
//! or more `data:` lines. [`parse_run_event`] maps the Assistants stream
//! events onto [`RunEvent`]s.

use serde_json::Value;

use super::{AssistantError, RunEvent};

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental frame decoder over raw response chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk and return the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CR never occurs inside a UTF-8 sequence, so dropping it is safe mid-chunk.
        self.buf
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(pos) = find_double_newline(&self.buf) {
            let raw = self.buf.drain(..pos + 2).collect::<Vec<_>>();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw)) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data = Vec::new();

    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}

/// What a frame means for the run stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSignal {
    Event(RunEvent),
    /// Not relevant to the reply text.
    Ignore,
    /// Terminal `done` frame.
    End,
}

/// Interpret an Assistants stream frame.
pub fn parse_run_event(frame: &SseFrame) -> Result<RunSignal, AssistantError> {
    if frame.data.trim() == "[DONE]" {
        return Ok(RunSignal::End);
    }

    match frame.event.as_deref() {
        Some("done") => Ok(RunSignal::End),
        Some("thread.message.delta") => {
            let v: Value = serde_json::from_str(&frame.data)?;
            let text = v["delta"]["content"]
                .as_array()
                .into_iter()
                .flatten()
                .filter(|block| block["type"] == "text")
                .filter_map(|block| block["text"]["value"].as_str())
                .collect::<String>();
            if text.is_empty() {
                Ok(RunSignal::Ignore)
            } else {
                Ok(RunSignal::Event(RunEvent::TextDelta(text)))
            }
        }
        Some("thread.run.completed") => Ok(RunSignal::Event(RunEvent::Completed)),
        Some(
            name @ ("thread.run.failed"
            | "thread.run.cancelled"
            | "thread.run.expired"
            | "thread.run.incomplete"
            | "thread.run.requires_action"),
        ) => {
            let status = name.trim_start_matches("thread.run.").to_string();
            let v: Value = serde_json::from_str(&frame.data).unwrap_or(Value::Null);
            let message = v["last_error"]["message"]
                .as_str()
                .or_else(|| v["incomplete_details"]["reason"].as_str())
                .map_or_else(|| format!("run ended with status {status}"), ToString::to_string);
            Err(AssistantError::Run { status, message })
        }
        Some("error") => {
            let v: Value = serde_json::from_str(&frame.data).unwrap_or(Value::Null);
            let message = v["message"]
                .as_str()
                .or_else(|| v["error"]["message"].as_str())
                .map_or_else(|| frame.data.clone(), ToString::to_string);
            Err(AssistantError::Run {
                status: "error".to_string(),
                message,
            })
        }
        _ => Ok(RunSignal::Ignore),
    }
}
