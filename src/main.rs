//! # Gemini Relay Gateway
//!
//! Serves OpenAI-style and native chat endpoints over a pool of Gemini API
//! keys, failing over between keys and restarting broken streams.
//!
//! ## Usage
//!
//! ```bash
//! # Keys from the environment, everything else default
//! GATEWAY_API_KEYS=AIza...,AIza... gemini-relay-gateway
//!
//! # Config file, reloaded on change
//! GATEWAY_CONFIG=/etc/gateway/config.yaml gemini-relay-gateway
//!
//! # Environment overrides
//! GATEWAY_PORT=9000 gemini-relay-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, loader::ENV_CONFIG, ConfigWatcher, GatewayConfig};
use gateway_routing::CredentialPool;
use gateway_server::{AppState, HealthChecker, Server};
use gateway_telemetry::{init_logging, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Application entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            if let Err(log_err) = init_logging(&LoggingConfig::new().with_level("info")) {
                eprintln!("Failed to initialize logging: {log_err}");
            }
            error!(error = %e, "Failed to load configuration");
            return Err(e).context("loading configuration");
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Gemini relay gateway"
    );

    run(config).await
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let health_settings = config.health_check.clone();
    let state = AppState::builder()
        .config(config.clone())
        .build()
        .context("building application state")?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        credentials = state.pool.len(),
        max_retries = state.max_retries(),
        "Application state ready"
    );

    // Held for the lifetime of the server
    let _watch = match std::env::var(ENV_CONFIG) {
        Ok(path) => Some(watch_config(PathBuf::from(path), config, Arc::clone(&state.pool))?),
        Err(_) => None,
    };

    let health = if health_settings.enabled {
        let checker = HealthChecker::new(
            Arc::clone(&state.pool),
            state.client.clone(),
            health_settings.interval,
        );
        info!(interval_secs = health_settings.interval.as_secs(), "Credential health checker started");
        Some(checker.spawn())
    } else {
        None
    };

    let result = Server::new(state).run().await;

    if let Some(handle) = health {
        handle.abort();
    }
    result.context("serving HTTP")
}

/// Watch the config file and feed key changes into the pool
///
/// Only the key list is applied live; other settings take effect on restart.
fn watch_config(
    path: PathBuf,
    initial: GatewayConfig,
    pool: Arc<CredentialPool>,
) -> anyhow::Result<gateway_config::WatchHandle> {
    let watcher = Arc::new(ConfigWatcher::new(path, initial));
    let handle = watcher.watch().context("watching configuration file")?;
    let mut updates = watcher.subscribe();

    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(config) => match pool.hot_reload(config.credentials.api_key_strings()) {
                    Ok(()) => info!(credentials = pool.len(), "Credential pool reloaded"),
                    Err(e) => warn!(error = %e, "Rejected credential reload, keeping current keys"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed configuration updates");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    Ok(handle)
}
