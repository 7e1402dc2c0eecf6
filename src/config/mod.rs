mod env;
mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use env::{Environment, MapEnv, ProcessEnv};
pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Largest request body accepted by the proxy endpoints
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            host: "127.0.0.1".to_string(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Upstream model API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL of the Messages API (e.g., "https://api.anthropic.com")
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Value sent in the `anthropic-version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Outer execution ceiling for a single upstream call, body included
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Model used by the synchronous endpoint when the caller names none
    #[serde(default = "default_model")]
    pub default_model: String,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for upstream connections
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format), e.g. for an egress proxy
    pub ca_cert_path: Option<String>,
}

fn default_upstream_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            api_version: default_api_version(),
            timeout_seconds: default_timeout(),
            default_model: default_model(),
            tls: None,
        }
    }
}

impl UpstreamConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Returns the Messages API endpoint
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url())
    }

    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.url.to_lowercase().starts_with("https://")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Streaming endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Internal deadline for upstream call setup, in milliseconds.
    /// Must stay below `upstream.timeout_seconds`.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_stream_max_tokens")]
    pub default_max_tokens: u32,
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_deadline_ms() -> u64 {
    270_000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_stream_max_tokens() -> u32 {
    16_000
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            temperature: default_temperature(),
            default_max_tokens: default_stream_max_tokens(),
            default_model: default_model(),
        }
    }
}

impl StreamingConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Synchronous endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_max_tokens")]
    pub default_max_tokens: u32,
}

fn default_sync_max_tokens() -> u32 {
    8_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: default_sync_max_tokens(),
        }
    }
}

/// Names of the environment variables read on every invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model_env")]
    pub model_env: String,
    #[serde(default = "default_max_tokens_env")]
    pub max_tokens_env: String,
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_model_env() -> String {
    "ANTHROPIC_MODEL".to_string()
}

fn default_max_tokens_env() -> String {
    "ANTHROPIC_MAX_TOKENS".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model_env: default_model_env(),
            max_tokens_env: default_max_tokens_env(),
        }
    }
}

impl CredentialsConfig {
    /// Upstream credential, `None` when unset or blank
    pub fn api_key(&self, env: &dyn Environment) -> Option<String> {
        env.var(&self.api_key_env)
    }

    /// Streaming model override
    pub fn model_override(&self, env: &dyn Environment) -> Option<String> {
        env.var(&self.model_env)
    }

    /// Streaming max-token override. An unparsable value is ignored.
    pub fn max_tokens_override(&self, env: &dyn Environment) -> Option<u32> {
        let raw = env.var(&self.max_tokens_env)?;
        match raw.trim().parse::<u32>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    variable = %self.max_tokens_env,
                    value = %raw,
                    error = %e,
                    "Ignoring unparsable max-token override"
                );
                None
            }
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with every section at its default, listening on `host:port`
    pub fn with_listen(host: &str, port: u16) -> Self {
        Self {
            server: ServerConfig {
                host: host.to_string(),
                port,
                ..ServerConfig::default()
            },
            upstream: UpstreamConfig::default(),
            streaming: StreamingConfig::default(),
            sync: SyncConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.upstream.url).map_err(|e| {
            ConfigError::Validation(format!("invalid upstream URL '{}': {}", self.upstream.url, e))
        })?;

        if self.streaming.deadline_ms == 0 {
            return Err(ConfigError::Validation(
                "streaming.deadline_ms must be greater than zero".to_string(),
            ));
        }

        if self.streaming.deadline() >= self.upstream.timeout() {
            return Err(ConfigError::Validation(format!(
                "streaming.deadline_ms ({}) must be shorter than upstream.timeout_seconds ({}s)",
                self.streaming.deadline_ms, self.upstream.timeout_seconds
            )));
        }

        if self.credentials.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "credentials.api_key_env must name an environment variable".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
