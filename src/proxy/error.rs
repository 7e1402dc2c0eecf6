//! Proxy error taxonomy and JSON error bodies

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::classify::ClassifiedError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream credential absent from the environment
    #[error("API key not configured")]
    Configuration,

    /// Synchronous endpoint: upstream unreachable or body unreadable
    #[error("Internal server error: {0}")]
    Transport(String),

    /// Synchronous endpoint: upstream answered with a non-success status
    #[error("{message}")]
    UpstreamHttp {
        status: StatusCode,
        message: String,
        details: serde_json::Value,
    },

    /// Streaming endpoint: classified upstream failure
    #[error("{}", .0.message)]
    Classified(ClassifiedError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Configuration | ProxyError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamHttp { status, .. } => *status,
            ProxyError::Classified(c) => c.status,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ProxyError::MethodNotAllowed => json!({ "error": "Method not allowed" }),
            ProxyError::InvalidRequest(message) => json!({
                "error": "Invalid request",
                "message": message,
            }),
            // Carries both `message` (synchronous shape) and `type` (streaming shape)
            ProxyError::Configuration => json!({
                "error": "Server configuration error",
                "message": "API key not configured",
                "type": "configuration_error",
            }),
            ProxyError::Transport(raw) => json!({
                "error": "Internal server error",
                "message": raw,
            }),
            ProxyError::UpstreamHttp { message, details, .. } => json!({
                "error": message,
                "details": details,
            }),
            ProxyError::Classified(c) => json!({
                "error": c.message,
                "type": c.kind,
            }),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// User-facing message for a non-success upstream status
pub fn upstream_status_message(status: u16) -> String {
    match status {
        401 => "Invalid API key. Please check the server configuration.".to_string(),
        403 => "Access forbidden. The API key does not have permission for this request.".to_string(),
        429 => "Rate limit exceeded. Please try again later.".to_string(),
        500 => "The AI service encountered an internal error.".to_string(),
        529 => "The AI service is overloaded. Please try again later.".to_string(),
        other => format!("API error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::classify::{classify, UpstreamFailure};

    #[test]
    fn test_status_messages() {
        assert!(upstream_status_message(401).starts_with("Invalid API key"));
        assert!(upstream_status_message(403).starts_with("Access forbidden"));
        assert!(upstream_status_message(429).starts_with("Rate limit"));
        assert!(upstream_status_message(500).contains("internal error"));
        assert!(upstream_status_message(529).contains("overloaded"));
        assert_eq!(upstream_status_message(999), "API error: 999");
        assert_eq!(upstream_status_message(418), "API error: 418");
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(ProxyError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ProxyError::InvalidRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::Configuration.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ProxyError::Transport("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_method_not_allowed_body() {
        assert_eq!(ProxyError::MethodNotAllowed.body(), json!({"error": "Method not allowed"}));
    }

    #[test]
    fn test_upstream_http_body() {
        let err = ProxyError::UpstreamHttp {
            status: StatusCode::FORBIDDEN,
            message: upstream_status_message(403),
            details: json!({"type": "error"}),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let body = err.body();
        assert!(body["error"].as_str().unwrap().starts_with("Access forbidden"));
        assert_eq!(body["details"], json!({"type": "error"}));
    }

    #[test]
    fn test_classified_body() {
        let err = ProxyError::Classified(classify(&UpstreamFailure {
            status: Some(529),
            ..UpstreamFailure::default()
        }));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = err.body();
        assert_eq!(body["type"], "overloaded");
        assert!(body.get("message").is_none());
    }
}
