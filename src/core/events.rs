use serde_json::Value;

use crate::core::error::FrameError;
use crate::core::sse::{SseFrame, DEFAULT_EVENT_NAME};

/// Data value that ends the logical response regardless of event name.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Reasoning trace category. Each kind is tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasoningKind {
    Summary,
    Text,
}

impl ReasoningKind {
    pub const ALL: [ReasoningKind; 2] = [ReasoningKind::Summary, ReasoningKind::Text];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningKind::Summary => "summary",
            ReasoningKind::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    OutputTextDelta {
        delta: String,
    },
    Completed,
    ReasoningPartAdded {
        kind: ReasoningKind,
        part: Option<Value>,
    },
    ReasoningDelta {
        kind: ReasoningKind,
        delta: String,
    },
    ReasoningDone {
        kind: ReasoningKind,
        /// Authoritative final text, when the event carries one.
        text: Option<String>,
    },
    Error,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvent {
    pub event_type: String,
    pub data: Value,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The `[DONE]` sentinel.
    Done,
    Typed(ResolvedEvent),
}

/// Turn one decoded frame into a stream event.
///
/// An explicit `event:` name wins over the payload's own `type` field.
pub fn resolve_frame(frame: &SseFrame) -> Result<StreamEvent, FrameError> {
    if frame.data == DONE_SENTINEL {
        return Ok(StreamEvent::Done);
    }

    let data: Value =
        serde_json::from_str(&frame.data).map_err(|source| FrameError::MalformedJson {
            data: frame.data.clone(),
            source,
        })?;

    let event_type = if frame.has_explicit_event() {
        frame.event.clone()
    } else {
        data.get("type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_EVENT_NAME)
            .to_string()
    };

    let kind = classify(&event_type, &data);
    Ok(StreamEvent::Typed(ResolvedEvent {
        event_type,
        data,
        kind,
    }))
}

fn classify(event_type: &str, data: &Value) -> EventKind {
    use ReasoningKind::{Summary, Text};

    match event_type {
        "response.output_text.delta" => EventKind::OutputTextDelta {
            delta: delta_text(data),
        },
        "response.completed" => EventKind::Completed,
        "response.reasoning_summary_part.added" => EventKind::ReasoningPartAdded {
            kind: Summary,
            part: data.get("part").cloned(),
        },
        "response.reasoning_summary_text.delta" | "response.reasoning_summary.delta" => {
            EventKind::ReasoningDelta {
                kind: Summary,
                delta: delta_text(data),
            }
        }
        "response.reasoning_summary_part.done"
        | "response.reasoning_summary_text.done"
        | "response.reasoning_summary.done" => EventKind::ReasoningDone {
            kind: Summary,
            text: final_text(data),
        },
        "response.reasoning_text.delta" | "response.reasoning.delta" => {
            EventKind::ReasoningDelta {
                kind: Text,
                delta: delta_text(data),
            }
        }
        "response.reasoning_text.done" | "response.reasoning.done" => EventKind::ReasoningDone {
            kind: Text,
            text: final_text(data),
        },
        "error" => EventKind::Error,
        _ => EventKind::Unknown,
    }
}

/// `delta` may be a bare string or an object with a `text` field.
fn delta_text(data: &Value) -> String {
    let delta = match data.get("delta") {
        Some(Value::String(text)) => Some(text.as_str()),
        Some(Value::Object(obj)) => obj.get("text").and_then(Value::as_str),
        _ => data.get("text").and_then(Value::as_str),
    };
    delta.unwrap_or_default().to_string()
}

fn final_text(data: &Value) -> Option<String> {
    data.get("text")
        .and_then(Value::as_str)
        .or_else(|| data.pointer("/part/text").and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
