//! HTTP client for the upstream Messages API

use axum::http::header;
use std::time::Duration;

use crate::api::MessagesRequest;
use crate::config::UpstreamConfig;

/// Upstream client: one pooled `reqwest::Client` shared by all invocations
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    messages_url: String,
    api_version: String,
}

impl UpstreamClient {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            http: build_http_client(config)?,
            messages_url: config.messages_url(),
            api_version: config.api_version.clone(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    /// POST a Messages request. Resolves once response headers arrive.
    pub async fn send(
        &self,
        api_key: &str,
        body: &MessagesRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        tracing::debug!(
            url = %self.messages_url,
            model = %body.model,
            max_tokens = body.max_tokens,
            stream = body.stream,
            "Sending upstream request"
        );

        let mut request = self
            .http
            .post(&self.messages_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(body);

        if body.stream {
            request = request.header(header::ACCEPT, "text/event-stream");
        }

        request.send().await
    }
}

/// Build an HTTP client with timeout and TLS configuration
fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10);

    if let Some(ref tls) = config.tls {
        if tls.accept_invalid_certs {
            client_builder = client_builder.danger_accept_invalid_certs(true);
            tracing::warn!("TLS: Accepting invalid certificates (use only for development/testing)");
        }

        if let Some(ref ca_path) = tls.ca_cert_path {
            let ca_cert = std::fs::read(ca_path)?;
            let ca_cert = reqwest::Certificate::from_pem(&ca_cert)?;
            client_builder = client_builder.add_root_certificate(ca_cert);
            tracing::info!("TLS: Loaded custom CA certificate from {}", ca_path);
        }
    }

    Ok(client_builder.build()?)
}
