//! Interfaces to services outside the request path.
//!
//! The gateway reports attempts to an [`AttemptSink`], hands generated binary
//! output to an [`UploadSink`], and asks a [`ModelCatalog`] whether a model
//! may be dispatched at all.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::GatewayResult;

/// One backend attempt, successful or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Model requested by the client
    pub model: String,
    /// Masked credential used for the attempt
    pub credential: String,
    /// Whether the attempt succeeded
    pub success: bool,
    /// HTTP-like status of the attempt
    pub status_code: u16,
    /// Wall time of the attempt
    pub latency: Duration,
}

/// A failed attempt, with the error detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Masked credential used for the attempt
    pub credential: String,
    /// Model requested by the client
    pub model: String,
    /// Stable error kind
    pub error_type: String,
    /// Error body or message
    pub error_body: String,
    /// HTTP-like status
    pub status_code: u16,
}

/// Receives attempt reports. Calls are made fire-and-forget.
#[async_trait]
pub trait AttemptSink: Send + Sync {
    /// Record one attempt
    async fn record_attempt(&self, record: AttemptRecord) -> GatewayResult<()>;

    /// Record one failed attempt's error detail
    async fn record_error(&self, record: ErrorRecord) -> GatewayResult<()>;
}

/// Sink that discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAttemptSink;

#[async_trait]
impl AttemptSink for NoopAttemptSink {
    async fn record_attempt(&self, _record: AttemptRecord) -> GatewayResult<()> {
        Ok(())
    }

    async fn record_error(&self, _record: ErrorRecord) -> GatewayResult<()> {
        Ok(())
    }
}

/// Stores binary output and returns a URL for it
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Upload `bytes` under `filename`, returning a public URL
    async fn upload(&self, bytes: Bytes, filename: &str) -> GatewayResult<String>;
}

/// Decides which models may be dispatched
pub trait ModelCatalog: Send + Sync {
    /// Whether `model` (including variant suffixes) is served
    fn is_model_supported(&self, model: &str) -> bool;

    /// Model names to advertise to clients
    fn models(&self) -> Vec<String>;
}
