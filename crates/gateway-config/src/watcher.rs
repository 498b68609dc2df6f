//! Config file hot reload.
//!
//! The current configuration lives in an [`ArcSwap`] so readers never block.
//! A successful reload replaces it and is broadcast to subscribers; a failed
//! reload is logged and the previous configuration stays in effect.

use arc_swap::ArcSwap;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use crate::loader::load_config_from;

/// Quiet period after a file event before reloading
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Holds the live configuration and reloads it from disk
pub struct ConfigWatcher {
    path: PathBuf,
    current: ArcSwap<GatewayConfig>,
    updates: broadcast::Sender<Arc<GatewayConfig>>,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Wrap an already loaded configuration
    pub fn new(path: impl Into<PathBuf>, initial: GatewayConfig) -> Self {
        let (updates, _) = broadcast::channel(8);
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(initial),
            updates,
        }
    }

    /// Watched file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration
    pub fn current(&self) -> Arc<GatewayConfig> {
        self.current.load_full()
    }

    /// Receive every configuration installed by a reload
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<GatewayConfig>> {
        self.updates.subscribe()
    }

    /// Reload from disk now
    ///
    /// # Errors
    /// Returns the load or validation error; the current configuration is
    /// kept in that case
    pub async fn reload(&self) -> Result<Arc<GatewayConfig>, ConfigError> {
        let config = Arc::new(load_config_from(Some(&self.path)).await?);
        self.current.store(Arc::clone(&config));

        let receivers = self.updates.send(Arc::clone(&config)).unwrap_or(0);
        info!(path = %self.path.display(), receivers, "Configuration reloaded");
        Ok(config)
    }

    /// Start watching the file
    ///
    /// The parent directory is watched so editors that replace the file on
    /// save are still seen. Dropping the returned handle stops watching.
    ///
    /// # Errors
    /// Returns `Watch` if the OS watcher cannot be created
    pub fn watch(self: &Arc<Self>) -> Result<WatchHandle, ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let file_name = self.path.file_name().map(ToOwned::to_owned);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref());
                    if relevant {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!(error = %e, "Config watch event error"),
            }
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(path = %self.path.display(), "Watching config file");

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(DEBOUNCE).await;
                while rx.try_recv().is_ok() {}

                debug!(path = %this.path.display(), "Config file changed");
                if let Err(e) = this.reload().await {
                    error!(error = %e, "Config reload failed, keeping previous configuration");
                }
            }
        });

        Ok(WatchHandle {
            _watcher: watcher,
            task,
        })
    }
}

/// Keeps a file watch alive
pub struct WatchHandle {
    _watcher: notify::RecommendedWatcher,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").finish_non_exhaustive()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
