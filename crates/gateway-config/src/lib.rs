//! # Gateway Config
//!
//! Configuration for the Gemini relay gateway.
//!
//! This crate provides:
//! - Typed settings with defaults for every section
//! - YAML or TOML files, chosen by extension
//! - `GATEWAY_*` environment overrides
//! - Validation and file-watch hot reload

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;
pub mod watcher;

// Re-export main types
pub use config::{
    AuthSettings, BackendSettings, CredentialSettings, GatewayConfig, HealthCheckSettings,
    ModelSettings, ServerSettings, StreamSettings, TranslatorSettings,
};
pub use error::ConfigError;
pub use loader::{apply_env_overrides, load_config, load_config_from, load_file, ConfigFormat};
pub use watcher::{ConfigWatcher, WatchHandle};
