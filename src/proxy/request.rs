//! Caller request validation

use axum::http::Method;

use super::error::ProxyError;
use crate::api::ChatRequest;

pub fn check_method(method: &Method) -> Result<(), ProxyError> {
    if method == Method::POST {
        Ok(())
    } else {
        Err(ProxyError::MethodNotAllowed)
    }
}

/// Parse and validate a caller body. `messages` must be a non-empty array.
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ProxyError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ProxyError::InvalidRequest(format!("Request body must be JSON: {}", e)))?;

    let problem = match value.get("messages") {
        None => Some("messages is required"),
        Some(serde_json::Value::Array(messages)) if messages.is_empty() => {
            Some("messages must not be empty")
        }
        Some(serde_json::Value::Array(_)) => None,
        Some(_) => Some("messages must be an array"),
    };
    if let Some(problem) = problem {
        return Err(ProxyError::InvalidRequest(problem.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProxyError::InvalidRequest(e.to_string()))
}
