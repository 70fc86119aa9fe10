use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A caller-side conversation message before it is shaped for the wire.
///
/// `content` is deliberately untyped: callers hand over plain strings,
/// chat-completions style part arrays, or anything else they have lying
/// around, and the request builder normalizes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ROLE_USER, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ROLE_ASSISTANT, content)
    }

    pub fn is_assistant(&self) -> bool {
        self.role == ROLE_ASSISTANT
    }
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    OutputText { text: String },
    InputImage { image_url: String },
}

impl ContentPart {
    pub fn text_for_role(role: &str, text: impl Into<String>) -> Self {
        if role == ROLE_ASSISTANT {
            ContentPart::OutputText { text: text.into() }
        } else {
            ContentPart::InputText { text: text.into() }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::InputText { text } | ContentPart::OutputText { text } => Some(text),
            ContentPart::InputImage { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<Turn>,
    pub store: bool,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningOptions>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextOptions {
    pub verbosity: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReasoningOptions {
    pub effort: String,
    /// Always serialized; `None` is sent as an explicit JSON `null`.
    pub summary: Option<String>,
}
