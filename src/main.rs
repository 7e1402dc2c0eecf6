//! llm-relay: HTTP relay for the Anthropic Messages API
//!
//! Serves two endpoints for a browser front end:
//! - `POST /api/messages` waits for the complete model response
//! - `POST /api/messages/stream` relays text as it is generated

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use llm_relay::{
    api::MessagesRequest,
    config::{AppConfig, ConfigError, Environment, ProcessEnv},
    proxy::UpstreamClient,
    run_server,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "llm-relay")]
#[command(version)]
#[command(about = "HTTP relay for the Anthropic Messages API")]
#[command(long_about = "
llm-relay forwards chat requests from a browser front end to the Anthropic
Messages API. The API key is read from the environment on every request.

Example usage:
  ANTHROPIC_API_KEY=sk-... llm-relay run --config config.yaml
  llm-relay check-config
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override upstream base URL (e.g., "https://api.anthropic.com")
        #[arg(long)]
        upstream_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Send a one-message request upstream and report the result
    TestUpstream,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_format);

    match cli.command {
        Commands::Run { port, upstream_url } => {
            let mut config = load_config_or_exit(&cli.config);
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(url) = upstream_url {
                config.upstream.url = url;
                config.validate()?;
            }
            tracing::info!("Loaded configuration from {:?}", cli.config);
            run_server(config)
                .await
                .map_err(|e| anyhow::anyhow!("server error: {}", e))?;
        }
        Commands::CheckConfig => check_config(&cli.config),
        Commands::TestUpstream => test_upstream(&cli.config).await?,
    }

    Ok(())
}

fn init_tracing(level: Option<LogLevel>, format: LogFormat) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level.to_string()),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Validate configuration file
fn check_config(config_path: &Path) {
    match AppConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("  Max body: {} bytes", config.server.max_body_bytes);
            println!("\nUpstream:");
            println!("  URL: {}", config.upstream.messages_url());
            println!("  API version: {}", config.upstream.api_version);
            println!("  TLS: {}", if config.upstream.is_tls() { "enabled" } else { "disabled" });
            if let Some(ref tls) = config.upstream.tls {
                if tls.accept_invalid_certs {
                    println!("  TLS: Accepting invalid certificates");
                }
                if let Some(ref ca) = tls.ca_cert_path {
                    println!("  TLS CA: {}", ca);
                }
            }
            println!("  Timeout: {}s", config.upstream.timeout_seconds);
            println!("  Default model: {}", config.upstream.default_model);
            println!("\nSynchronous endpoint:");
            println!("  Default max tokens: {}", config.sync.default_max_tokens);
            println!("\nStreaming endpoint:");
            println!("  Deadline: {}ms", config.streaming.deadline_ms);
            println!("  Temperature: {}", config.streaming.temperature);
            println!("  Default max tokens: {}", config.streaming.default_max_tokens);
            println!("  Default model: {}", config.streaming.default_model);

            let creds = &config.credentials;
            println!("\nEnvironment:");
            println!(
                "  {}: {}",
                creds.api_key_env,
                if ProcessEnv.var(&creds.api_key_env).is_some() { "set" } else { "NOT SET" }
            );
            println!(
                "  {}: {}",
                creds.model_env,
                creds.model_override(&ProcessEnv).unwrap_or_else(|| "(default)".to_string())
            );
            println!(
                "  {}: {}",
                creds.max_tokens_env,
                creds
                    .max_tokens_override(&ProcessEnv)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "(default)".to_string())
            );
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Send a minimal request upstream
async fn test_upstream(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config_or_exit(config_path);
    let env: Arc<dyn Environment> = Arc::new(ProcessEnv);

    let Some(api_key) = config.credentials.api_key(env.as_ref()) else {
        eprintln!("✗ {} is not set", config.credentials.api_key_env);
        std::process::exit(1);
    };

    let client = UpstreamClient::from_config(&config.upstream)
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {}", e))?;

    println!("Testing upstream: {}", client.messages_url());

    let body = MessagesRequest {
        model: config.upstream.default_model.clone(),
        max_tokens: 16,
        system: String::new(),
        messages: vec![serde_json::json!({"role": "user", "content": "Reply with the word OK."})],
        temperature: None,
        stream: false,
    };

    match client.send(&api_key, &body).await {
        Ok(resp) => {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if status.is_success() {
                println!("✓ Upstream is reachable");
                println!("  Status: {}", status);
            } else {
                println!("✗ Upstream returned error status: {}", status);
                println!("  Body: {}", text.trim());
            }
        }
        Err(e) => {
            println!("✗ Failed to reach upstream: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &Path) -> AppConfig {
    match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(path)) => {
            eprintln!("Configuration file not found: {}", path);
            eprintln!("\nYou can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}
