use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or empty.
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_base_url: String,
    pub upstream_project_id: String,
    pub upstream_api_key: String,
    pub request_timeout_secs: u64,
    pub stream_timeout_secs: u64,
    pub max_retries: u32,
    pub port: u16,
    pub rust_log: String,
}

/// Everything the chat pipeline needs to talk to the upstream service.
/// Built once at startup and handed to `LlmClient::new`; the pipeline never
/// reads the environment itself.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub project_id: String,
    pub api_key: String,
    /// Deadline for each outbound request until response headers arrive.
    pub request_timeout: Duration,
    /// Deadline for consuming one response stream to completion.
    pub stream_timeout: Duration,
    /// Extra attempts for transient failures (connect errors, 429, 5xx).
    pub max_retries: u32,
}

impl UpstreamConfig {
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stream_timeout: Duration::from_secs(DEFAULT_STREAM_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 180;
const DEFAULT_MAX_RETRIES: u32 = 2;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            upstream_base_url: require_env("UPSTREAM_BASE_URL")?,
            upstream_project_id: require_env("UPSTREAM_PROJECT_ID")?,
            upstream_api_key: require_env("UPSTREAM_API_KEY")?,
            request_timeout_secs: parse_env_or(
                "UPSTREAM_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            stream_timeout_secs: parse_env_or(
                "UPSTREAM_STREAM_TIMEOUT_SECS",
                DEFAULT_STREAM_TIMEOUT_SECS,
            )?,
            max_retries: parse_env_or("UPSTREAM_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Projects the settings the chat pipeline consumes.
    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig::new(
            self.upstream_base_url.clone(),
            self.upstream_project_id.clone(),
            self.upstream_api_key.clone(),
        )
        .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
        .with_stream_timeout(Duration::from_secs(self.stream_timeout_secs))
        .with_max_retries(self.max_retries)
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = std::env::var(key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("Required environment variable '{key}' is empty");
    }
    Ok(value)
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
