//! Messages API wire types
//!
//! Covers the caller-facing request body, the body sent upstream, upstream
//! error envelopes, and the subset of stream events the relay acts on.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Request body accepted from callers
///
/// Messages are kept as raw JSON and relayed verbatim. `model` and
/// `max_tokens` are advisory: a value of the wrong type reads as absent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub system: Option<String>,
    pub messages: Vec<Value>,
    /// Honored by the synchronous endpoint only
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    /// Honored by the synchronous endpoint only
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_tokens: Option<u32>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// Accepts any whole number in `u32` range, including `8000.0`
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Number(n)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(n) = n.as_u64() {
        return Ok(u32::try_from(n).ok());
    }
    Ok(n.as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
        .map(|f| f as u32))
}

/// Request body sent to the upstream Messages API
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl MessagesRequest {
    /// Build a non-streaming request, falling back to server defaults for
    /// fields the caller left out
    pub fn complete(request: ChatRequest, default_model: &str, default_max_tokens: u32) -> Self {
        Self {
            model: request.model.unwrap_or_else(|| default_model.to_string()),
            max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
            system: request.system.unwrap_or_default(),
            messages: request.messages,
            temperature: None,
            stream: false,
        }
    }

    /// Build a streaming request. Model and token budget come from the server
    /// only; the caller's values are dropped.
    pub fn streaming(request: ChatRequest, model: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model,
            max_tokens,
            system: request.system.unwrap_or_default(),
            messages: request.messages,
            temperature: Some(temperature),
            stream: true,
        }
    }
}

/// `{"type":"error","error":{...}}` envelope returned on upstream failures
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Stream event, keyed by its `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ApiErrorBody },
    /// message_start, ping, content_block_start, ...
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

impl StreamEvent {
    /// Text carried by this event, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => Some(text),
            _ => None,
        }
    }
}
