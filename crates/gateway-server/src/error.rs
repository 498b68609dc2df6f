//! HTTP error responses.
//!
//! Errors render in the schema of the endpoint that produced them: OpenAI
//! style under `/v1` and `/hf/v1`, Google style under `/v1beta`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{ClientProtocol, GatewayError};
use gateway_providers::{native, openai};
use serde_json::json;
use tracing::{error, warn};

/// Client protocol implied by a request path
pub fn protocol_for_path(path: &str) -> ClientProtocol {
    if path.starts_with("/v1beta") {
        ClientProtocol::Native
    } else {
        ClientProtocol::OpenAi
    }
}

/// Error returned by handlers and extractors
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Human-readable message
    pub message: String,
    /// Machine-readable kind
    pub error_type: &'static str,
    /// Schema to render in
    pub protocol: ClientProtocol,
    source: Option<GatewayError>,
}

impl ApiError {
    fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_type,
            protocol: ClientProtocol::OpenAi,
            source: None,
        }
    }

    /// 400 response
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", message)
    }

    /// 401 response
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication_error", message)
    }

    /// 404 response
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found_error", message)
    }

    /// Render in the schema of `protocol`
    #[must_use]
    pub fn for_protocol(mut self, protocol: ClientProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    fn body(&self) -> serde_json::Value {
        if let Some(source) = &self.source {
            return match self.protocol {
                ClientProtocol::OpenAi => openai::error_body(source),
                ClientProtocol::Native => native::error_body(source),
            };
        }

        match self.protocol {
            ClientProtocol::OpenAi => json!({
                "error": {
                    "message": self.message,
                    "type": self.error_type,
                    "code": self.status.as_u16(),
                }
            }),
            ClientProtocol::Native => json!({
                "error": {
                    "code": self.status.as_u16(),
                    "message": self.message,
                    "status": native_status(self.status),
                }
            }),
        }
    }
}

fn native_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "INVALID_ARGUMENT",
        StatusCode::UNAUTHORIZED => "UNAUTHENTICATED",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        _ => "INTERNAL",
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            message: err.to_string(),
            error_type: err.last_error().error_type(),
            protocol: ClientProtocol::OpenAi,
            source: Some(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error_type = self.error_type, message = %self.message, "Request failed");
        } else {
            warn!(status = %self.status, error_type = self.error_type, message = %self.message, "Request rejected");
        }
        (self.status, Json(self.body())).into_response()
    }
}
