//! Mock upstream Messages API and relay helpers shared by integration tests
//!
//! The mock binds an ephemeral port and serves queued responses on
//! `POST /v1/messages`, recording every request it receives.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request},
    response::Response,
    routing::post,
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use llm_relay::config::{AppConfig, MapEnv};
use llm_relay::{build_router, ProxyState};

pub const TEST_API_KEY: &str = "sk-test-key";

/// A canned upstream response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: String,
    pub chunks: Vec<String>,
    /// Wait before sending headers
    pub delay: Duration,
    /// Wait before each body chunk
    pub chunk_delay: Duration,
}

impl MockResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            chunks: vec![body.into()],
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            ..Self::json(body)
        }
    }

    /// Server-sent events, one chunk per event
    pub fn sse(events: Vec<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream".to_string(),
            chunks: events,
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Debug, Default)]
pub struct UpstreamState {
    pub response_queue: VecDeque<MockResponse>,
    pub received_requests: Vec<ReceivedRequest>,
}

pub type SharedUpstreamState = Arc<Mutex<UpstreamState>>;

pub struct MockUpstream {
    pub url: String,
    pub state: SharedUpstreamState,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state: SharedUpstreamState = Arc::new(Mutex::new(UpstreamState::default()));

        let app = Router::new()
            .route("/v1/messages", post(handle_messages))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock upstream failed");
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn queue(&self, response: MockResponse) {
        self.state.lock().unwrap().response_queue.push_back(response);
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.state.lock().unwrap().received_requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().received_requests.len()
    }
}

async fn handle_messages(
    State(state): State<SharedUpstreamState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let mock = {
        let mut state = state.lock().unwrap();
        state.received_requests.push(ReceivedRequest { headers, body });
        state
            .response_queue
            .pop_front()
            .unwrap_or_else(|| MockResponse::json(text_message("Default response (no mock queued)")))
    };

    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }

    let chunk_delay = mock.chunk_delay;
    let body = Body::from_stream(futures::stream::iter(mock.chunks).then(move |chunk| async move {
        if !chunk_delay.is_zero() {
            tokio::time::sleep(chunk_delay).await;
        }
        Ok::<_, Infallible>(chunk)
    }));

    Response::builder()
        .status(mock.status)
        .header("content-type", mock.content_type)
        .body(body)
        .unwrap()
}

// ─── Upstream payload builders ───────────────────────────────────────────────

/// Complete (non-streaming) Messages API response
pub fn text_message(text: &str) -> String {
    json!({
        "id": "msg_test001",
        "type": "message",
        "role": "assistant",
        "model": "claude-sync-default",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 4}
    })
    .to_string()
}

/// Upstream error envelope
pub fn error_body(kind: &str, message: &str) -> String {
    json!({"type": "error", "error": {"type": kind, "message": message}}).to_string()
}

pub fn sse_event(name: &str, data: Value) -> String {
    format!("event: {}\ndata: {}\n\n", name, data)
}

/// A full event sequence streaming `parts` as text deltas
pub fn text_stream(parts: &[&str]) -> Vec<String> {
    let mut events = vec![
        sse_event(
            "message_start",
            json!({"type": "message_start", "message": {"id": "msg_stream", "role": "assistant", "content": []}}),
        ),
        sse_event(
            "content_block_start",
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        sse_event("ping", json!({"type": "ping"})),
    ];
    events.extend(parts.iter().map(|part| text_delta(part)));
    events.push(sse_event(
        "content_block_stop",
        json!({"type": "content_block_stop", "index": 0}),
    ));
    events.push(sse_event(
        "message_delta",
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 7}}),
    ));
    events.push(sse_event("message_stop", json!({"type": "message_stop"})));
    events
}

pub fn text_delta(text: &str) -> String {
    sse_event(
        "content_block_delta",
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}),
    )
}

// ─── Relay helpers ───────────────────────────────────────────────────────────

pub fn relay_config(upstream_url: &str) -> AppConfig {
    let mut config = AppConfig::with_listen("127.0.0.1", 0);
    config.upstream.url = upstream_url.to_string();
    config.upstream.default_model = "claude-sync-default".to_string();
    config.streaming.default_model = "claude-stream-default".to_string();
    config
}

pub fn env_with_key() -> MapEnv {
    MapEnv::new().with("ANTHROPIC_API_KEY", TEST_API_KEY)
}

pub fn relay(config: AppConfig, env: MapEnv) -> Router {
    build_router(ProxyState::new(config, Arc::new(env)).unwrap())
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, body.to_string())
}

pub fn post_raw(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

pub fn basic_chat(prompt: &str) -> Value {
    json!({"messages": [{"role": "user", "content": prompt}]})
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A base URL nothing is listening on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
