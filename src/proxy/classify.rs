//! Upstream failure classification
//!
//! Every failure seen by the streaming endpoint is reduced to an
//! [`UpstreamFailure`] and mapped through [`classify`] to one of five
//! caller-facing kinds. Structured signals (status, code) are checked before
//! the failure name; the first matching rule wins.

use axum::http::StatusCode;
use serde::Serialize;
use std::error::Error as StdError;

use crate::api::ApiErrorBody;

/// Name given to failures caused by the internal deadline firing
pub const ABORT_ERROR: &str = "AbortError";

/// Raw failure with whatever structured signals were available
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamFailure {
    pub name: Option<String>,
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    /// Source chain, logged server-side only
    pub detail: Option<String>,
}

impl UpstreamFailure {
    /// Upstream call aborted by the internal deadline
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            name: Some(ABORT_ERROR.to_string()),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Transport-level failure from the HTTP client
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let name = if err.is_timeout() {
            "TimeoutError"
        } else if err.is_connect() {
            "ConnectError"
        } else if err.is_body() || err.is_decode() {
            "BodyError"
        } else {
            "RequestError"
        };

        Self {
            name: Some(name.to_string()),
            message: err.to_string(),
            code: err.is_timeout().then(|| "timeout".to_string()),
            status: err.status().map(|s| s.as_u16()),
            detail: source_chain(err),
        }
    }

    /// Non-success upstream response. The error `type` from the upstream
    /// envelope becomes the code when the body parses.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let envelope = serde_json::from_slice::<crate::api::ApiErrorEnvelope>(body).ok();
        let raw = String::from_utf8_lossy(body).into_owned();

        match envelope {
            Some(envelope) => Self {
                name: Some("ApiError".to_string()),
                message: envelope.error.message,
                code: Some(envelope.error.kind),
                status: Some(status.as_u16()),
                detail: Some(raw),
            },
            None => Self {
                name: Some("ApiError".to_string()),
                message: format!("upstream returned {}", status),
                code: None,
                status: Some(status.as_u16()),
                detail: (!raw.is_empty()).then_some(raw),
            },
        }
    }

    /// `error` event received inside an already-accepted stream
    pub fn from_stream_error(error: ApiErrorBody) -> Self {
        Self {
            name: Some("StreamError".to_string()),
            message: error.message,
            code: Some(error.kind),
            status: None,
            detail: None,
        }
    }

    /// Log every available field for server-side diagnosis
    pub fn log(&self, context: &str) {
        tracing::error!(
            name = self.name.as_deref().unwrap_or("unknown"),
            message = %self.message,
            code = self.code.as_deref().unwrap_or("none"),
            status = ?self.status,
            detail = self.detail.as_deref().unwrap_or(""),
            "{}",
            context
        );
    }
}

fn source_chain(err: &dyn StdError) -> Option<String> {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(inner) = source {
        chain.push(inner.to_string());
        source = inner.source();
    }
    (!chain.is_empty()).then(|| chain.join(": "))
}

/// Caller-facing failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    Overloaded,
    Timeout,
    Auth,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Overloaded => "overloaded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of [`classify`]. Only constructed there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: &'static str,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, status: StatusCode, message: &'static str) -> Self {
        Self {
            kind,
            status,
            message,
        }
    }
}

fn code_is(failure: &UpstreamFailure, codes: &[&str]) -> bool {
    failure
        .code
        .as_deref()
        .is_some_and(|code| codes.contains(&code))
}

/// Map a failure to its caller-facing classification
pub fn classify(failure: &UpstreamFailure) -> ClassifiedError {
    let status = failure.status;

    if status == Some(429) || code_is(failure, &["rate_limit_error", "rate_limit_exceeded"]) {
        return ClassifiedError::new(
            ErrorKind::RateLimit,
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please wait a moment and try again.",
        );
    }

    // 529 is normalized to 503
    if matches!(status, Some(529) | Some(503)) || code_is(failure, &["overloaded_error", "api_error"]) {
        return ClassifiedError::new(
            ErrorKind::Overloaded,
            StatusCode::SERVICE_UNAVAILABLE,
            "The AI service is temporarily overloaded. Please try again in a few minutes.",
        );
    }

    if failure.name.as_deref() == Some(ABORT_ERROR) || code_is(failure, &["timeout"]) {
        return ClassifiedError::new(
            ErrorKind::Timeout,
            StatusCode::GATEWAY_TIMEOUT,
            "The request timed out before the AI service responded. Please try again.",
        );
    }

    if status == Some(401) || code_is(failure, &["authentication_error"]) {
        return ClassifiedError::new(
            ErrorKind::Auth,
            StatusCode::UNAUTHORIZED,
            "Authentication with the AI service failed. Please contact the administrator.",
        );
    }

    ClassifiedError::new(
        ErrorKind::Internal,
        StatusCode::INTERNAL_SERVER_ERROR,
        "An unexpected error occurred while processing the request.",
    )
}
