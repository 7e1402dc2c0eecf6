//! Request handling for the proxy endpoints

use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use super::error::{upstream_status_message, ProxyError};
use super::request::{check_method, parse_chat_request};
use super::request_log::format_request_log;
use super::server::ProxyState;
use super::streaming::open_stream;
use crate::api::{ChatRequest, MessagesRequest};
use crate::proxy::classify::UpstreamFailure;

/// Proxy request handler
pub struct ProxyHandler {
    state: ProxyState,
}

impl ProxyHandler {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    /// Synchronous endpoint: forward and wait for the complete upstream body
    pub async fn handle_messages(&self, req: Request<Body>) -> Response {
        let span = tracing::info_span!("messages", request_id = %Uuid::new_v4());
        let result = self.forward_messages(req).instrument(span.clone()).await;
        finish(result, &span)
    }

    /// Streaming endpoint: relay upstream text deltas as they arrive
    pub async fn handle_stream(&self, req: Request<Body>) -> Response {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("stream", %request_id);
        let result = async {
            let (chat, api_key) = self.preflight(req).await?;
            open_stream(&self.state, chat, &api_key, request_id).await
        }
        .instrument(span.clone())
        .await;
        finish(result, &span)
    }

    /// Checks shared by both endpoints, in order: method, credential, body.
    /// The credential is checked before the body is read.
    async fn preflight(&self, req: Request<Body>) -> Result<(ChatRequest, String), ProxyError> {
        check_method(req.method())?;

        let credentials = &self.state.config.credentials;
        let api_key = credentials
            .api_key(self.state.env.as_ref())
            .ok_or_else(|| {
                tracing::error!(
                    variable = %credentials.api_key_env,
                    "Upstream credential is not configured"
                );
                ProxyError::Configuration
            })?;

        let body = to_bytes(req.into_body(), self.state.config.server.max_body_bytes)
            .await
            .map_err(|e| ProxyError::InvalidRequest(format!("Failed to read request body: {}", e)))?;

        let chat = parse_chat_request(&body)?;
        tracing::debug!("{}", format_request_log(&chat));

        Ok((chat, api_key))
    }

    async fn forward_messages(&self, req: Request<Body>) -> Result<Response, ProxyError> {
        let (chat, api_key) = self.preflight(req).await?;

        let config = &self.state.config;
        let body = MessagesRequest::complete(
            chat,
            &config.upstream.default_model,
            config.sync.default_max_tokens,
        );

        let upstream_response = self
            .state
            .upstream
            .send(&api_key, &body)
            .await
            .map_err(|e| {
                UpstreamFailure::from_reqwest(&e).log("Failed to reach upstream");
                ProxyError::Transport(e.to_string())
            })?;

        let status = upstream_response.status();
        let bytes = upstream_response.bytes().await.map_err(|e| {
            UpstreamFailure::from_reqwest(&e).log("Failed to read upstream response");
            ProxyError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            let error_body = String::from_utf8_lossy(&bytes).into_owned();
            tracing::error!(
                status = %status,
                error_body = %error_body,
                "Upstream returned error response"
            );
            let details = serde_json::from_slice(&bytes)
                .unwrap_or(serde_json::Value::String(error_body));
            return Err(ProxyError::UpstreamHttp {
                status,
                message: upstream_status_message(status.as_u16()),
                details,
            });
        }

        tracing::debug!(status = %status, body_size = bytes.len(), "Relaying upstream response");

        Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
    }
}

fn finish(result: Result<Response, ProxyError>, span: &tracing::Span) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => {
            span.in_scope(|| {
                tracing::warn!(status = %err.status(), error = %err, "Request failed");
            });
            err.into_response()
        }
    }
}
