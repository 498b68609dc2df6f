//! Integration tests for the Gemini relay gateway
//!
//! Each test runs the real HTTP server on a local port against a wiremock
//! stand-in for the Gemini API, covering:
//! - Both client protocols, unary and streaming
//! - Credential failover and pool administration
//! - Stream restart and terminal error frames
//! - Client token checks

pub mod fixtures;
pub mod helpers;
pub mod mock_backend;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_backend::*;

#[cfg(test)]
mod api_tests;
#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod routing_tests;
