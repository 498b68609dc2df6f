//! Client access check.
//!
//! A token is accepted from, in order: `Authorization: Bearer <token>`, the
//! `x-goog-api-key` header, or the `key` query parameter. The last two let
//! native-protocol SDKs authenticate unchanged.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use gateway_config::AuthSettings;
use gateway_providers::google::API_KEY_HEADER;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{protocol_for_path, ApiError};
use crate::state::AppState;

/// Paths served without a token
const PUBLIC_PATHS: &[&str] = &["/health"];

/// Allowed client tokens
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    enabled: bool,
    tokens: HashSet<String>,
}

impl AuthState {
    /// Build from settings
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            enabled: settings.enabled,
            tokens: settings.token_strings().into_iter().collect(),
        }
    }

    /// Accept every request
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether tokens are checked
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `token` is allowed
    pub fn is_allowed(&self, token: &str) -> bool {
        !self.enabled || self.tokens.contains(token)
    }

    /// Whether `path` skips the check
    pub fn is_public_path(path: &str) -> bool {
        PUBLIC_PATHS.contains(&path)
    }
}

/// Token presented by the client, if any
pub fn extract_token(request: &Request) -> Option<String> {
    let headers = request.headers();

    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let bearer = bearer.trim();
        if !bearer.is_empty() {
            return Some(bearer.to_string());
        }
    }

    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    request.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("key=")
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        })
    })
}

/// Reject requests without an allowed token
pub async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let auth = &state.auth;
    let path = request.uri().path().to_string();

    if !auth.is_enabled() || AuthState::is_public_path(&path) {
        return next.run(request).await;
    }

    let protocol = protocol_for_path(&path);
    match extract_token(&request) {
        Some(token) if auth.is_allowed(&token) => {
            debug!(path = %path, "Request authenticated");
            next.run(request).await
        }
        Some(_) => {
            warn!(path = %path, "Rejected request with unknown token");
            ApiError::unauthorized("Invalid API token")
                .for_protocol(protocol)
                .into_response()
        }
        None => {
            warn!(path = %path, "Rejected request without token");
            ApiError::unauthorized("Missing API token")
                .for_protocol(protocol)
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use secrecy::SecretString;

    fn request(uri: &str, header: Option<(&str, &str)>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_token_sources() {
        assert_eq!(
            extract_token(&request("/v1/models", Some(("authorization", "Bearer sk-1")))),
            Some("sk-1".to_string())
        );
        assert_eq!(
            extract_token(&request("/v1beta/models", Some(("x-goog-api-key", "sk-2")))),
            Some("sk-2".to_string())
        );
        assert_eq!(
            extract_token(&request("/v1beta/models?alt=sse&key=sk-3", None)),
            Some("sk-3".to_string())
        );
        assert_eq!(extract_token(&request("/v1/models", Some(("authorization", "Basic abc")))), None);
        assert_eq!(extract_token(&request("/v1/models?key=", None)), None);
    }

    #[test]
    fn test_allow_list() {
        let state = AuthState::from_settings(&AuthSettings {
            enabled: true,
            allowed_tokens: vec![SecretString::new("sk-good".into())],
        });
        assert!(state.is_allowed("sk-good"));
        assert!(!state.is_allowed("sk-bad"));
        assert!(AuthState::disabled().is_allowed("anything"));
    }

    #[test]
    fn test_public_paths() {
        assert!(AuthState::is_public_path("/health"));
        assert!(!AuthState::is_public_path("/admin/pool"));
    }
}
