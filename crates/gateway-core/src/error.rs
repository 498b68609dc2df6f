//! Error types for the gateway.
//!
//! Every failure that crosses a crate boundary is a [`GatewayError`]. The
//! variants follow how the retry loop treats them: upstream and stream
//! failures are retried against another credential, client-side validation
//! failures are rejected before any credential is spent.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Unified gateway error
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Backend answered with a non-success status
    #[error("upstream error (status {status}): {message}")]
    Upstream {
        /// HTTP status returned by the backend
        status: u16,
        /// Human readable message extracted from the error body
        message: String,
        /// Raw error body, kept for error logging
        body: Option<String>,
    },

    /// Connection-level failure talking to the backend
    #[error("network error: {message}")]
    Network {
        /// Error description
        message: String,
    },

    /// Backend call exceeded its per-call timeout
    #[error("upstream call timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Stream failed before the first client-visible frame
    #[error("stream failed to start (status {status}): {message}")]
    StreamInit {
        /// Status code carried by the backend error object
        status: u16,
        /// Error message
        message: String,
    },

    /// Stream failed after frames were already delivered
    #[error("stream interrupted: {message}")]
    StreamInterrupted {
        /// Error description
        message: String,
    },

    /// Malformed client request
    #[error("validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Offending field, if known
        field: Option<String>,
    },

    /// Requested model is not served by this gateway
    #[error("model not supported: {model}")]
    UnsupportedModel {
        /// Requested model name
        model: String,
    },

    /// Retry budget ran out; carries the last underlying error
    #[error("all {attempts} attempts failed, last error: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<GatewayError>,
    },

    /// Binary upload collaborator failed
    #[error("upload failed: {message}")]
    Upload {
        /// Error description
        message: String,
    },

    /// Invalid configuration
    #[error("configuration error: {message}")]
    Configuration {
        /// Error description
        message: String,
    },

    /// Unexpected internal failure
    #[error("internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl GatewayError {
    /// Create an upstream error
    pub fn upstream(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
            body,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Create a stream initialisation error
    pub fn stream_init(status: u16, message: impl Into<String>) -> Self {
        Self::StreamInit {
            status,
            message: message.into(),
        }
    }

    /// Create a mid-stream error
    pub fn stream_interrupted(message: impl Into<String>) -> Self {
        Self::StreamInterrupted {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: Option<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field,
        }
    }

    /// Create an unsupported model error
    pub fn unsupported_model(model: impl Into<String>) -> Self {
        Self::UnsupportedModel {
            model: model.into(),
        }
    }

    /// Create an upload error
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the retry loop should fail over to another credential.
    ///
    /// Any backend-side failure counts, including 4xx: the backend reports an
    /// invalid key as 400, so a client error can still be credential specific.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. }
                | Self::Network { .. }
                | Self::Timeout { .. }
                | Self::StreamInit { .. }
                | Self::StreamInterrupted { .. }
        )
    }

    /// HTTP status to report to the client
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Upstream { status, .. } | Self::StreamInit { status, .. } => *status,
            Self::Network { .. } | Self::StreamInterrupted { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Validation { .. } | Self::UnsupportedModel { .. } => 400,
            Self::RetriesExhausted { last, .. } => last.status_code(),
            Self::Upload { .. } | Self::Configuration { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Stable machine-readable error kind, used in logs and error bodies
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Upstream { status, .. } => match status {
                401 | 403 => "credential_rejected",
                429 => "rate_limited",
                500..=599 => "upstream_unavailable",
                _ => "upstream_error",
            },
            Self::Network { .. } => "network_error",
            Self::Timeout { .. } => "timeout",
            Self::StreamInit { .. } => "stream_init_error",
            Self::StreamInterrupted { .. } => "stream_interrupted",
            Self::Validation { .. } => "invalid_request_error",
            Self::UnsupportedModel { .. } => "model_not_supported",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Upload { .. } => "upload_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// The error from the final attempt, unwrapping retry exhaustion
    #[must_use]
    pub fn last_error(&self) -> &Self {
        match self {
            Self::RetriesExhausted { last, .. } => last.last_error(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("invalid JSON: {err}"), None)
    }
}
