//! Streaming endpoint: deadline-guarded call setup and token relay
//!
//! The deadline covers only call setup. Once upstream answers with a success
//! status the timer is disarmed and text deltas are relayed as a plain text
//! body with no buffering. Failures before that point become a classified
//! JSON error. A failure after relaying has started cannot change the status
//! already sent, so the body is terminated with an error instead of a clean
//! end of stream. That includes upstream closing before `message_stop`.

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{future, stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::classify::{classify, UpstreamFailure};
use super::deadline::Deadline;
use super::error::ProxyError;
use super::server::ProxyState;
use crate::api::{ChatRequest, MessagesRequest, StreamEvent};

/// Issue the upstream streaming call and hand back a relaying response
pub async fn open_stream(
    state: &ProxyState,
    chat: ChatRequest,
    api_key: &str,
    request_id: Uuid,
) -> Result<Response, ProxyError> {
    let env = state.env.as_ref();
    let credentials = &state.config.credentials;
    let streaming = &state.config.streaming;

    let model = credentials
        .model_override(env)
        .unwrap_or_else(|| streaming.default_model.clone());
    let max_tokens = credentials
        .max_tokens_override(env)
        .unwrap_or(streaming.default_max_tokens);
    let body = MessagesRequest::streaming(chat, model, max_tokens, streaming.temperature);

    let deadline = Deadline::arm(streaming.deadline());

    let response = match deadline.guard(state.upstream.send(api_key, &body)).await {
        Some(Ok(response)) => response,
        Some(Err(e)) => return Err(fail(UpstreamFailure::from_reqwest(&e))),
        None => {
            return Err(fail(UpstreamFailure::aborted(format!(
                "upstream call not accepted within {}ms",
                deadline.duration().as_millis()
            ))))
        }
    };

    let status = response.status();
    if !status.is_success() {
        let error_body = match deadline.guard(response.bytes()).await {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read upstream error body");
                Bytes::new()
            }
            None => Bytes::new(),
        };
        return Err(fail(UpstreamFailure::from_status(status, &error_body)));
    }

    deadline.disarm();
    tracing::debug!(status = %status, "Upstream accepted streaming call");

    Ok(relay_text(response, request_id))
}

fn fail(failure: UpstreamFailure) -> ProxyError {
    failure.log("Streaming upstream call failed");
    ProxyError::Classified(classify(&failure))
}

/// Relay text deltas from the upstream event stream as they arrive
fn relay_text(response: reqwest::Response, request_id: Uuid) -> Response {
    let finished = Arc::new(AtomicBool::new(false));

    let seen = finished.clone();
    let tokens = response
        .bytes_stream()
        .eventsource()
        .filter_map(move |event| {
            future::ready(match event {
                Ok(event) => relay_event(&event.data, &seen, request_id),
                Err(e) => Some(Err(broken(e.to_string(), request_id))),
            })
        });

    // Upstream closing cleanly without message_stop is still a truncation
    let tail = stream::once(async move {
        let truncated: Option<Result<Bytes, std::io::Error>> = if finished.load(Ordering::Acquire) {
            None
        } else {
            Some(Err(broken(
                "upstream stream ended before message_stop".to_string(),
                request_id,
            )))
        };
        truncated
    })
    .filter_map(future::ready);

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(tokens.chain(tail)),
    )
        .into_response()
}

fn broken(message: String, request_id: Uuid) -> std::io::Error {
    let failure = UpstreamFailure {
        name: Some("StreamError".to_string()),
        message,
        ..UpstreamFailure::default()
    };
    let classified = classify(&failure);
    tracing::error_span!("stream", %request_id, kind = %classified.kind)
        .in_scope(|| failure.log("Upstream stream broke mid-relay"));
    std::io::Error::other(failure.message)
}

fn relay_event(
    data: &str,
    finished: &AtomicBool,
    request_id: Uuid,
) -> Option<Result<Bytes, std::io::Error>> {
    let event = match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::trace!(error = %e, data = %data, "Skipping undecodable stream event");
            return None;
        }
    };

    match event {
        StreamEvent::Error { error } => {
            let failure = UpstreamFailure::from_stream_error(error);
            let classified = classify(&failure);
            tracing::error_span!("stream", %request_id, kind = %classified.kind)
                .in_scope(|| failure.log("Upstream failed mid-stream"));
            Some(Err(std::io::Error::other(format!(
                "upstream stream failed: {}",
                classified.kind
            ))))
        }
        StreamEvent::MessageStop => {
            finished.store(true, Ordering::Release);
            tracing::debug!(%request_id, "Upstream stream complete");
            None
        }
        other => other
            .text()
            .filter(|text| !text.is_empty())
            .map(|text| Ok(Bytes::copy_from_slice(text.as_bytes()))),
    }
}
