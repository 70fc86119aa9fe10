use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

/// Failures that reject a whole streaming call.
///
/// Configuration problems surface before any network I/O; transport
/// problems surface as soon as the response status or body is known.
#[derive(Debug)]
pub enum StreamError {
    /// No bearer credential was available from the configured source.
    MissingCredential,

    /// The request body could not be serialized.
    InvalidRequest(serde_json::Error),

    /// The HTTP request could not be sent or no response arrived.
    Request(reqwest::Error),

    /// The endpoint answered with a non-success status.
    Status {
        status: StatusCode,
        /// Response body, formatted for display.
        body: String,
    },

    /// The endpoint answered successfully but without a body to stream.
    MissingBody,

    /// Reading the streaming body failed mid-flight.
    Read(reqwest::Error),
}

impl StreamError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StreamError::MissingCredential | StreamError::InvalidRequest(_)
        )
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::MissingCredential => write!(
                f,
                "No API key configured. Set OPENAI_API_KEY or run `ponder auth`."
            ),
            StreamError::InvalidRequest(source) => {
                write!(f, "Failed to encode request body: {source}")
            }
            StreamError::Request(source) => write!(f, "Request failed: {source}"),
            StreamError::Status { status, body } => {
                write!(f, "HTTP {status}\n{body}")
            }
            StreamError::MissingBody => write!(f, "Response carried no body to stream"),
            StreamError::Read(source) => write!(f, "Stream interrupted: {source}"),
        }
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StreamError::InvalidRequest(source) => Some(source),
            StreamError::Request(source) | StreamError::Read(source) => Some(source),
            _ => None,
        }
    }
}

/// Problems confined to a single frame. These are reported through the
/// `on_error` callback and never stop the read loop.
#[derive(Debug)]
pub enum FrameError {
    /// A `data:` payload that was neither `[DONE]` nor valid JSON.
    MalformedJson {
        data: String,
        source: serde_json::Error,
    },

    /// An upstream `error` event, carried verbatim.
    Upstream(Value),
}

impl FrameError {
    /// Short, single-line description suitable for inline display.
    pub fn summary(&self) -> String {
        match self {
            FrameError::MalformedJson { source, .. } => {
                format!("Malformed stream frame: {source}")
            }
            FrameError::Upstream(payload) => extract_error_summary(payload)
                .filter(|summary| !summary.is_empty())
                .unwrap_or_else(|| "Upstream error".to_string()),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MalformedJson { data, source } => {
                write!(f, "Malformed stream frame ({source}): {data}")
            }
            FrameError::Upstream(payload) => {
                write!(f, "{}", format_api_error(&payload.to_string()))
            }
        }
    }
}

impl StdError for FrameError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            FrameError::MalformedJson { source, .. } => Some(source),
            FrameError::Upstream(_) => None,
        }
    }
}

pub(crate) fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

pub(crate) fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_api_error_prettifies_json_with_summary() {
        let raw = r#"{"error":{"message":"model overloaded","type":"invalid_request_error"}}"#;
        let formatted = format_api_error(raw);

        let expected = r#"API Error: model overloaded
```json
{
  "error": {
    "message": "model overloaded",
    "type": "invalid_request_error"
  }
}
```"#;
        assert_eq!(formatted, expected);
    }

    #[test]
    fn format_api_error_handles_xml_plaintext_and_empty() {
        assert_eq!(
            format_api_error("<error>bad</error>"),
            "API Error:\n```xml\n<error>bad</error>\n```"
        );
        assert_eq!(
            format_api_error("api failure"),
            "API Error:\n```\napi failure\n```"
        );
        assert_eq!(format_api_error("  "), "API Error:\n```\n<empty>\n```");
    }

    #[test]
    fn upstream_summary_collapses_whitespace() {
        let payload = serde_json::json!({
            "type": "error",
            "message": "rate   limit\n exceeded"
        });
        let error = FrameError::Upstream(payload);
        assert_eq!(error.summary(), "rate limit exceeded");
    }

    #[test]
    fn upstream_summary_falls_back_when_message_missing() {
        let error = FrameError::Upstream(serde_json::json!({"type": "error"}));
        assert_eq!(error.summary(), "Upstream error");
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        assert!(StreamError::MissingCredential.is_configuration());
        assert!(!StreamError::MissingBody.is_configuration());
    }
}
