//! Shapes caller messages into a Responses API request body.
//!
//! Everything here is pure: the only inputs beyond the arguments are the
//! three reasoning preferences, read through [`ReasoningPreferences`].

use serde_json::{Map, Value};

use crate::api::{
    ChatMessage, ContentPart, ReasoningOptions, ResponsesRequest, TextOptions, Turn, ROLE_ASSISTANT,
};
use crate::core::config::ReasoningPreferences;

/// Model used when the caller picks nothing usable.
pub const DEFAULT_REASONING_MODEL: &str = "gpt-5";

/// Substrings identifying model families that emit reasoning traces.
const REASONING_MODEL_MARKERS: &[&str] = &["gpt-5", "o1", "o3", "o4"];

/// Substrings identifying families the Responses endpoint does not serve.
const LEGACY_MODEL_MARKERS: &[&str] = &["gpt-3.5", "davinci", "babbage", "curie", "text-"];

/// Summary preference value that maps to an explicit JSON `null`.
const SUMMARY_NULL_LITERAL: &str = "null";

pub fn is_reasoning_model(model: &str) -> bool {
    let normalized = model.to_ascii_lowercase();
    REASONING_MODEL_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
}

fn is_legacy_model(model: &str) -> bool {
    let normalized = model.to_ascii_lowercase();
    normalized == "gpt-4"
        || LEGACY_MODEL_MARKERS
            .iter()
            .any(|marker| normalized.contains(marker))
}

/// Pick the model a request is actually sent with.
pub fn resolve_model(selected: Option<&str>) -> String {
    match selected.map(str::trim) {
        Some(model) if !model.is_empty() && !is_legacy_model(model) => model.to_string(),
        _ => DEFAULT_REASONING_MODEL.to_string(),
    }
}

/// Convert each message into exactly one [`Turn`].
///
/// Never fails: content that does not fit a known shape is stringified into
/// a text part.
pub fn build_input_from_messages(messages: &[ChatMessage]) -> Vec<Turn> {
    messages
        .iter()
        .map(|message| Turn {
            role: message.role.clone(),
            content: convert_content(&message.role, &message.content),
        })
        .collect()
}

fn convert_content(role: &str, content: &Value) -> Vec<ContentPart> {
    match content {
        Value::String(text) => vec![ContentPart::text_for_role(role, text.as_str())],
        Value::Array(items) => items.iter().map(|item| convert_part(role, item)).collect(),
        other => vec![ContentPart::text_for_role(role, stringify(other))],
    }
}

fn convert_part(role: &str, item: &Value) -> ContentPart {
    let Some(obj) = item.as_object() else {
        return match item {
            Value::String(text) => ContentPart::text_for_role(role, text.as_str()),
            other => ContentPart::text_for_role(role, stringify(other)),
        };
    };

    match (obj.get("type").and_then(Value::as_str), obj.get("text")) {
        (Some("text" | "input_text"), Some(Value::String(text))) => {
            ContentPart::text_for_role(role, text.as_str())
        }
        // Only assistant turns may carry model output.
        (Some("output_text"), Some(Value::String(text))) if role == ROLE_ASSISTANT => {
            ContentPart::OutputText { text: text.clone() }
        }
        (Some("image_url" | "input_image"), _) => match image_url_of(obj) {
            Some(url) => ContentPart::InputImage { image_url: url },
            None => ContentPart::text_for_role(role, stringify(item)),
        },
        _ => ContentPart::text_for_role(role, stringify(item)),
    }
}

/// Accepts `image_url` as a bare string or as `{url}` / `{image_url}`.
fn image_url_of(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("image_url")? {
        Value::String(url) => Some(url.clone()),
        Value::Object(inner) => inner
            .get("url")
            .or_else(|| inner.get("image_url"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Build the request body. `reasoning` and `text` are attached only for
/// reasoning-capable models.
pub fn build_responses_payload(
    model: &str,
    input: Vec<Turn>,
    stream: bool,
    preferences: &dyn ReasoningPreferences,
) -> ResponsesRequest {
    let mut request = ResponsesRequest {
        model: model.to_string(),
        input,
        store: false,
        stream,
        text: None,
        reasoning: None,
    };

    if is_reasoning_model(model) {
        let summary = preferences.reasoning_summary();
        request.text = Some(TextOptions {
            verbosity: preferences.verbosity(),
        });
        request.reasoning = Some(ReasoningOptions {
            effort: preferences.reasoning_effort(),
            summary: (summary != SUMMARY_NULL_LITERAL).then_some(summary),
        });
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StaticPreferences;
    use serde_json::json;

    fn message(role: &str, content: Value) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content,
        }
    }

    #[test]
    fn plain_strings_become_role_appropriate_text_parts() {
        let turns = build_input_from_messages(&[
            ChatMessage::user("Hello  there\n"),
            ChatMessage::assistant("Hi!"),
        ]);

        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].content,
            vec![ContentPart::InputText {
                text: "Hello  there\n".into()
            }]
        );
        assert_eq!(
            turns[1].content,
            vec![ContentPart::OutputText { text: "Hi!".into() }]
        );
    }

    #[test]
    fn array_content_normalizes_each_entry() {
        let content = json!([
            "loose string",
            {"type": "text", "text": "typed text"},
            {"type": "input_text", "text": "already normalized"},
            {"type": "image_url", "image_url": {"url": "https://img.example/a.png"}},
            {"type": "image_url", "image_url": {"image_url": "https://img.example/b.png"}},
            {"type": "input_image", "image_url": "https://img.example/c.png"},
            {"type": "audio", "data": 3}
        ]);
        let turns = build_input_from_messages(&[message("user", content)]);
        let parts = &turns[0].content;

        assert_eq!(parts.len(), 7);
        assert_eq!(parts[0].text(), Some("loose string"));
        assert_eq!(parts[1].text(), Some("typed text"));
        assert_eq!(parts[2].text(), Some("already normalized"));
        assert_eq!(
            parts[3],
            ContentPart::InputImage {
                image_url: "https://img.example/a.png".into()
            }
        );
        assert_eq!(
            parts[4],
            ContentPart::InputImage {
                image_url: "https://img.example/b.png".into()
            }
        );
        assert_eq!(
            parts[5],
            ContentPart::InputImage {
                image_url: "https://img.example/c.png".into()
            }
        );
        let fallback = parts[6].text().expect("stringified part");
        let reparsed: Value = serde_json::from_str(fallback).expect("json text");
        assert_eq!(reparsed, json!({"type": "audio", "data": 3}));
    }

    #[test]
    fn assistant_array_parts_use_output_text() {
        let turns = build_input_from_messages(&[message(
            "assistant",
            json!([{"type": "text", "text": "answer"}]),
        )]);
        assert_eq!(
            turns[0].content,
            vec![ContentPart::OutputText {
                text: "answer".into()
            }]
        );
    }

    #[test]
    fn output_text_is_kept_for_assistant_and_stringified_otherwise() {
        let part = json!({"type": "output_text", "text": "earlier answer"});
        let turns = build_input_from_messages(&[
            message("assistant", json!([part.clone()])),
            message("user", json!([part.clone()])),
        ]);

        assert_eq!(
            turns[0].content,
            vec![ContentPart::OutputText {
                text: "earlier answer".into()
            }]
        );
        match &turns[1].content[..] {
            [ContentPart::InputText { text }] => {
                let reparsed: Value = serde_json::from_str(text).expect("json text");
                assert_eq!(reparsed, part);
            }
            other => panic!("unexpected parts {other:?}"),
        }
    }

    #[test]
    fn non_string_content_is_stringified() {
        let turns = build_input_from_messages(&[
            message("user", json!({"odd": true})),
            message("user", json!(42)),
            message("user", Value::Null),
        ]);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content[0].text(), Some(r#"{"odd":true}"#));
        assert_eq!(turns[1].content[0].text(), Some("42"));
        assert_eq!(turns[2].content[0].text(), Some("null"));
    }

    #[test]
    fn reasoning_fields_are_gated_on_model() {
        let prefs = StaticPreferences::default();
        let input = build_input_from_messages(&[ChatMessage::user("hi")]);

        let plain = build_responses_payload("gpt-4o", input.clone(), false, &prefs);
        let plain_json = serde_json::to_value(&plain).unwrap();
        assert!(plain_json.get("reasoning").is_none());
        assert!(plain_json.get("text").is_none());
        assert_eq!(plain_json["store"], json!(false));
        assert_eq!(plain_json["stream"], json!(false));

        let reasoning = build_responses_payload("gpt-5-mini", input, false, &prefs);
        let reasoning_json = serde_json::to_value(&reasoning).unwrap();
        assert_eq!(reasoning_json["reasoning"]["effort"], json!("medium"));
        assert_eq!(reasoning_json["reasoning"]["summary"], json!("auto"));
        assert_eq!(reasoning_json["text"]["verbosity"], json!("medium"));
    }

    #[test]
    fn null_summary_literal_serializes_as_json_null() {
        let prefs = StaticPreferences {
            summary: "null".into(),
            ..Default::default()
        };
        let payload = build_responses_payload("o3", Vec::new(), true, &prefs);
        let json = serde_json::to_value(&payload).unwrap();
        let reasoning = json["reasoning"].as_object().expect("reasoning object");
        assert!(reasoning.contains_key("summary"));
        assert_eq!(reasoning["summary"], Value::Null);
    }

    #[test]
    fn resolve_model_replaces_legacy_and_empty_selections() {
        assert_eq!(resolve_model(None), DEFAULT_REASONING_MODEL);
        assert_eq!(resolve_model(Some("  ")), DEFAULT_REASONING_MODEL);
        assert_eq!(resolve_model(Some("gpt-3.5-turbo")), DEFAULT_REASONING_MODEL);
        assert_eq!(resolve_model(Some("GPT-4")), DEFAULT_REASONING_MODEL);
        assert_eq!(resolve_model(Some("gpt-4o")), "gpt-4o");
        assert_eq!(resolve_model(Some("o4-mini")), "o4-mini");
    }
}
