//! # Gateway Resilience
//!
//! Failover for backend calls:
//! - Attempt budget per client request
//! - Credential rotation on retryable failures
//! - Mid-stream restart for streaming responses
//! - Fire-and-forget attempt reporting

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod retry;

// Re-export main types
pub use retry::{RetryContext, RetryOrchestrator};
