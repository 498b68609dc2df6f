//! Attempt reporting through `tracing`.

use async_trait::async_trait;
use gateway_core::{AttemptRecord, AttemptSink, ErrorRecord, GatewayResult};
use tracing::{info, warn};

/// Longest error body excerpt written to the log
const MAX_BODY_EXCERPT: usize = 512;

/// [`AttemptSink`] that emits one log event per record under the
/// `gateway::attempts` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAttemptSink;

impl TracingAttemptSink {
    /// Create a new sink
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AttemptSink for TracingAttemptSink {
    async fn record_attempt(&self, record: AttemptRecord) -> GatewayResult<()> {
        info!(
            target: "gateway::attempts",
            model = %record.model,
            credential = %record.credential,
            success = record.success,
            status = record.status_code,
            latency_ms = record.latency.as_millis() as u64,
            "Backend attempt"
        );
        Ok(())
    }

    async fn record_error(&self, record: ErrorRecord) -> GatewayResult<()> {
        let excerpt: String = record.error_body.chars().take(MAX_BODY_EXCERPT).collect();
        warn!(
            target: "gateway::attempts",
            model = %record.model,
            credential = %record.credential,
            error_type = %record.error_type,
            status = record.status_code,
            body = %excerpt,
            "Backend error"
        );
        Ok(())
    }
}
