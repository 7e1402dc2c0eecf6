//! One-line request summary for debug logging

use crate::api::ChatRequest;

/// Format a request summary, e.g. `→ msgs=2 system=120ch max_tokens=8000 "first user text"`
pub fn format_request_log(request: &ChatRequest) -> String {
    let mut parts = vec![format!("msgs={}", request.messages.len())];

    if let Some(ref model) = request.model {
        parts.push(format!("model={}", model));
    }

    if let Some(ref system) = request.system {
        if !system.is_empty() {
            parts.push(format!("system={}ch", system.chars().count()));
        }
    }

    if let Some(max_tokens) = request.max_tokens {
        parts.push(format!("max_tokens={}", max_tokens));
    }

    if let Some(msg) = first_user_text(request) {
        parts.push(format!("\"{}\"", msg));
    }

    format!("→ {}", parts.join(" "))
}

fn first_user_text(request: &ChatRequest) -> Option<String> {
    let message = request
        .messages
        .iter()
        .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))?;
    let text = content_text(message.get("content")?)?;
    Some(truncate_middle(&normalize_whitespace(&text)))
}

/// Text of a string content or of the text blocks in a block array
fn content_text(content: &serde_json::Value) -> Option<String> {
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }

    let texts: Vec<&str> = content
        .as_array()?
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .collect();

    (!texts.is_empty()).then(|| texts.join(" "))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep the first 25 and last 75 characters of anything over 100
fn truncate_middle(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = chars[..PREFIX_LEN].iter().collect();
    let suffix: String = chars[chars.len() - SUFFIX_LEN..].iter().collect();
    format!("{} ... {}", prefix, suffix)
}
