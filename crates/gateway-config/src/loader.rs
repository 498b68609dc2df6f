//! File and environment loading.
//!
//! Precedence, lowest first: built-in defaults, the config file named by
//! `GATEWAY_CONFIG`, then the individual `GATEWAY_*` overrides.

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::error::ConfigError;

/// Path of the config file
pub const ENV_CONFIG: &str = "GATEWAY_CONFIG";
/// Bind address override
pub const ENV_HOST: &str = "GATEWAY_HOST";
/// Bind port override
pub const ENV_PORT: &str = "GATEWAY_PORT";
/// Comma-separated upstream keys
pub const ENV_API_KEYS: &str = "GATEWAY_API_KEYS";
/// Comma-separated client tokens; setting it enables auth
pub const ENV_ALLOWED_TOKENS: &str = "GATEWAY_ALLOWED_TOKENS";
/// Log filter override
pub const ENV_LOG_LEVEL: &str = "GATEWAY_LOG_LEVEL";

/// Config file syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for any other extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load the process configuration
///
/// # Errors
/// Returns error if the file cannot be read or parsed, an override is
/// malformed, or validation fails
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let path = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
    load_config_from(path.as_deref()).await
}

/// Load from an optional file, then apply environment overrides and validate
///
/// # Errors
/// See [`load_config`]
pub async fn load_config_from(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_file(path).await?,
        None => {
            debug!("No config file given, starting from defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;

    info!(
        file = ?path,
        keys = config.credentials.api_key_strings().len(),
        auth = config.auth.enabled,
        "Configuration loaded"
    );
    Ok(config)
}

/// Read and parse one file without overrides or validation
///
/// # Errors
/// Returns `Io`, `Parse` or `UnsupportedFormat`
pub async fn load_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_str(&contents, format).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse configuration text
///
/// # Errors
/// Returns the parser's message
pub fn parse_str(contents: &str, format: ConfigFormat) -> Result<GatewayConfig, String> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
    }
}

/// Apply `GATEWAY_*` overrides read through `lookup`
///
/// # Errors
/// Returns `Env` if `GATEWAY_PORT` is not a port number
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_HOST) {
        config.server.host = host;
    }

    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT.to_string(),
            message: format!("'{port}' is not a valid port"),
        })?;
    }

    if let Some(keys) = lookup(ENV_API_KEYS) {
        config.credentials.api_keys = split_secrets(&keys);
    }

    if let Some(tokens) = lookup(ENV_ALLOWED_TOKENS) {
        config.auth.allowed_tokens = split_secrets(&tokens);
        config.auth.enabled = !config.auth.allowed_tokens.is_empty();
    }

    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }

    Ok(())
}

fn split_secrets(list: &str) -> Vec<SecretString> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| SecretString::new(s.to_string()))
        .collect()
}
