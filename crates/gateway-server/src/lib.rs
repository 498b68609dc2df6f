//! # Gateway Server
//!
//! HTTP surface of the relay gateway.
//!
//! This crate provides:
//! - OpenAI-compatible and native chat endpoints
//! - Credential pool administration
//! - Client token checks
//! - Periodic probing of failed credentials
//! - Graceful shutdown with a drain deadline

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod routes;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use auth::{auth_middleware, AuthState};
pub use error::ApiError;
pub use health::{HealthChecker, HealthResponse, SweepReport};
pub use routes::create_router;
pub use server::Server;
pub use service::ChatService;
pub use shutdown::shutdown_signal;
pub use state::{AppState, AppStateBuilder};
