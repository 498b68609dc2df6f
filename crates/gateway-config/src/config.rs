//! Configuration structures.

use gateway_telemetry::LoggingConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerSettings,

    /// Upstream key pool
    #[serde(default)]
    pub credentials: CredentialSettings,

    /// Backend endpoint
    #[serde(default)]
    pub backend: BackendSettings,

    /// Request and response translation
    #[serde(default)]
    pub translator: TranslatorSettings,

    /// Output pacing for streams
    #[serde(default)]
    pub stream: StreamSettings,

    /// Background probing of failed keys
    #[serde(default)]
    pub health_check: HealthCheckSettings,

    /// Client access tokens
    #[serde(default)]
    pub auth: AuthSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Served models
    #[serde(default)]
    pub models: ModelSettings,
}

impl GatewayConfig {
    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns `Validation` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::validation("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::validation("server.port", "must be non-zero"));
        }

        if self.credentials.api_key_strings().is_empty() {
            return Err(ConfigError::validation(
                "credentials.api_keys",
                "at least one non-blank key is required",
            ));
        }
        if self.credentials.max_failures == 0 {
            return Err(ConfigError::validation("credentials.max_failures", "must be at least 1"));
        }
        if self.credentials.max_retries == 0 {
            return Err(ConfigError::validation("credentials.max_retries", "must be at least 1"));
        }

        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::validation("backend.base_url", "must not be empty"));
        }
        if self.backend.timeout.is_zero() {
            return Err(ConfigError::validation("backend.timeout", "must be non-zero"));
        }

        let stream = &self.stream;
        if stream.short_threshold == 0 || stream.short_threshold >= stream.long_threshold {
            return Err(ConfigError::validation(
                "stream.short_threshold",
                "must be positive and below stream.long_threshold",
            ));
        }
        if stream.min_delay > stream.max_delay {
            return Err(ConfigError::validation(
                "stream.min_delay",
                "must not exceed stream.max_delay",
            ));
        }
        if stream.chunk_size == 0 {
            return Err(ConfigError::validation("stream.chunk_size", "must be at least 1"));
        }

        if self.health_check.enabled && self.health_check.interval.is_zero() {
            return Err(ConfigError::validation("health_check.interval", "must be non-zero"));
        }

        if self.auth.enabled && self.auth.token_strings().is_empty() {
            return Err(ConfigError::validation(
                "auth.allowed_tokens",
                "auth is enabled but no token is configured",
            ));
        }

        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline for unary requests, retries included
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Grace period for in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Credential pool settings
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSettings {
    /// Upstream API keys
    #[serde(default)]
    pub api_keys: Vec<SecretString>,

    /// Failures after which a key is skipped
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Attempts per client request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            max_failures: default_max_failures(),
            max_retries: default_max_retries(),
        }
    }
}

impl CredentialSettings {
    /// Non-blank keys, trimmed
    pub fn api_key_strings(&self) -> Vec<String> {
        exposed(&self.api_keys)
    }
}

/// Backend endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    /// Base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API version path segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-call timeout
    #[serde(default = "default_backend_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Model used to probe key health
    #[serde(default = "default_probe_model")]
    pub probe_model: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            timeout: default_backend_timeout(),
            probe_model: default_probe_model(),
        }
    }
}

/// Translation settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslatorSettings {
    /// Inject the code execution tool where allowed
    #[serde(default)]
    pub code_execution: bool,

    /// Surface model reasoning to clients
    #[serde(default)]
    pub show_thinking: bool,

    /// Append grounding sources to answers
    #[serde(default)]
    pub show_search_link: bool,

    /// Per-model reasoning budgets
    #[serde(default)]
    pub thinking_budgets: HashMap<String, i32>,
}

/// Stream pacing settings
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSettings {
    /// Pace text output
    #[serde(default = "default_true")]
    pub optimize: bool,

    /// Texts at or below this length use `max_delay`
    #[serde(default = "default_short_threshold")]
    pub short_threshold: usize,

    /// Texts at or above this length use `min_delay` and chunking
    #[serde(default = "default_long_threshold")]
    pub long_threshold: usize,

    /// Shortest per-piece delay
    #[serde(default = "default_min_delay", with = "humantime_serde")]
    pub min_delay: Duration,

    /// Longest per-piece delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Characters per piece for long texts
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            optimize: true,
            short_threshold: default_short_threshold(),
            long_threshold: default_long_threshold(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Health checker settings
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckSettings {
    /// Run the checker
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between sweeps
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_health_interval(),
        }
    }
}

/// Client access settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
    /// Require a token on API routes
    #[serde(default)]
    pub enabled: bool,

    /// Accepted tokens
    #[serde(default)]
    pub allowed_tokens: Vec<SecretString>,
}

impl AuthSettings {
    /// Non-blank tokens, trimmed
    pub fn token_strings(&self) -> Vec<String> {
        exposed(&self.allowed_tokens)
    }
}

/// Served model lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSettings {
    /// Base models; empty accepts any base model
    #[serde(default)]
    pub supported: Vec<String>,

    /// Models offered with the `-search` suffix
    #[serde(default)]
    pub search: Vec<String>,

    /// Models offered with the `-image` suffix
    #[serde(default)]
    pub image: Vec<String>,

    /// Models that reason by default
    ///
    /// Offered with the `-non-thinking` suffix, and sent `includeThoughts`
    /// unless the caller sets a thinking config.
    #[serde(default)]
    pub thinking: Vec<String>,
}

fn exposed(secrets: &[SecretString]) -> Vec<String> {
    secrets
        .iter()
        .map(|s| s.expose_secret().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_failures() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_version() -> String {
    "v1beta".to_string()
}

fn default_backend_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_probe_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_short_threshold() -> usize {
    10
}

fn default_long_threshold() -> usize {
    50
}

fn default_min_delay() -> Duration {
    Duration::from_millis(16)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(24)
}

fn default_chunk_size() -> usize {
    5
}

fn default_health_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}
