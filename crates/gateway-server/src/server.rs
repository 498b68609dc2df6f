//! HTTP server lifecycle.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::create_router;
use crate::shutdown::{shutdown_signal, DrainGuard};
use crate::state::AppState;

/// The gateway HTTP server
#[derive(Debug, Clone)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over prepared state
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Configured listen address
    pub fn address(&self) -> String {
        let server = &self.state.config.server;
        format!("{}:{}", server.host, server.port)
    }

    /// Bind the configured address and serve until a shutdown signal
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `signal` resolves and connections drain
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = String> + Send + 'static,
    {
        let local: SocketAddr = listener.local_addr()?;
        let drain_timeout = self.state.config.server.shutdown_timeout;
        info!(
            address = %local,
            credentials = self.state.pool.len(),
            models = self.state.catalog.models().len(),
            "Gateway listening"
        );

        let (trigger, guard) = DrainGuard::new(signal, drain_timeout);
        let app = create_router(self.state);
        let server = axum::serve(listener, app).with_graceful_shutdown(trigger);

        tokio::select! {
            result = server.into_future() => result?,
            () = guard.expired() => {}
        }

        info!("Gateway stopped");
        Ok(())
    }
}
