//! Credential health checking and the liveness endpoint.
//!
//! The checker periodically probes every credential at the failure
//! threshold. A key that answers is reset and rejoins the rotation; one that
//! still fails has the failure recorded again.

use gateway_providers::GeminiClient;
use gateway_routing::CredentialPool;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Credentials probed
    pub probed: usize,
    /// Credentials reset after a successful probe
    pub restored: usize,
    /// Credentials whose probe failed again
    pub still_failing: usize,
}

/// Periodic prober for failed credentials
#[derive(Debug, Clone)]
pub struct HealthChecker {
    pool: Arc<CredentialPool>,
    client: GeminiClient,
    interval: Duration,
}

impl HealthChecker {
    /// Create a checker
    pub fn new(pool: Arc<CredentialPool>, client: GeminiClient, interval: Duration) -> Self {
        Self {
            pool,
            client,
            interval,
        }
    }

    /// Probe every invalid credential once
    pub async fn sweep(&self) -> SweepReport {
        let invalid: Vec<_> = self.pool.status().invalid.into_keys().collect();
        let mut report = SweepReport {
            probed: invalid.len(),
            ..SweepReport::default()
        };

        for credential in invalid {
            match self.client.probe(credential.expose()).await {
                Ok(()) => {
                    self.pool.reset(&credential);
                    report.restored += 1;
                    info!(credential = %credential, "Credential passed health probe");
                }
                Err(e) => {
                    let _ = self.pool.record_failure(&credential, 1, 1);
                    report.still_failing += 1;
                    debug!(credential = %credential, error = %e, "Credential still failing");
                }
            }
        }

        if report.probed > 0 {
            info!(
                probed = report.probed,
                restored = report.restored,
                still_failing = report.still_failing,
                "Health sweep complete"
            );
        }
        report
    }

    /// Run sweeps forever on the configured interval
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let report = self.sweep().await;
                if report.still_failing > 0 && report.still_failing == self.pool.len() {
                    warn!(size = self.pool.len(), "Every credential is failing");
                }
            }
        })
    }
}

/// Liveness body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when no credential is below the threshold
    pub status: &'static str,
    /// Version
    pub version: &'static str,
    /// Credential counts
    pub credentials: CredentialCounts,
}

/// Pool size split by validity
#[derive(Debug, Serialize)]
pub struct CredentialCounts {
    /// All credentials
    pub total: usize,
    /// Below the failure threshold
    pub valid: usize,
    /// At the failure threshold
    pub invalid: usize,
}

impl HealthResponse {
    /// Snapshot the pool
    pub fn from_pool(pool: &CredentialPool) -> Self {
        let status = pool.status();
        let credentials = CredentialCounts {
            total: status.valid.len() + status.invalid.len(),
            valid: status.valid.len(),
            invalid: status.invalid.len(),
        };
        Self {
            status: if credentials.valid > 0 { "healthy" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            credentials,
        }
    }
}
