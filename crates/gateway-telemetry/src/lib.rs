//! # Gateway Telemetry
//!
//! Observability for the Gemini relay gateway.
//!
//! This crate provides:
//! - Structured logging setup (pretty or JSON)
//! - An attempt sink that reports backend attempts as log events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attempt_sink;
pub mod logging;

// Re-export main types
pub use attempt_sink::TracingAttemptSink;
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
