//! HTTP client for the Gemini API.
//!
//! The client performs exactly one backend call per invocation. Failover and
//! retries belong to the orchestrator, so nothing here retries.

use async_stream::try_stream;
use bytes::BytesMut;
use futures::stream::BoxStream;
use futures::StreamExt;
use gateway_core::{GatewayError, GatewayResult};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, trace};

use super::payload::BackendPayload;
use super::wire::{GeminiErrorBody, GeminiModelList, GeminiResponse};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Backend connection settings
#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
    /// Base URL, e.g. `https://generativelanguage.googleapis.com`
    pub base_url: String,
    /// API version path segment
    pub api_version: String,
    /// Timeout for a unary call, and for the response head of a stream
    pub timeout: Duration,
    /// Model fetched by [`GeminiClient::probe`]
    pub probe_model: String,
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_version: "v1beta".to_string(),
            timeout: Duration::from_secs(300),
            probe_model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl GeminiClientConfig {
    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiClientConfig,
    http: Client,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: GeminiClientConfig) -> GatewayResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Connection settings
    pub fn config(&self) -> &GeminiClientConfig {
        &self.config
    }

    fn models_url(&self) -> String {
        format!(
            "{}/{}/models",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version
        )
    }

    fn endpoint_url(&self, model: &str, streaming: bool) -> String {
        let action = if streaming {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        format!("{}/{model}:{action}", self.models_url())
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        match tokio::time::timeout(self.config.timeout, request.send()).await {
            Err(_) => Err(GatewayError::timeout(self.config.timeout)),
            Ok(Err(e)) if e.is_timeout() => Err(GatewayError::timeout(self.config.timeout)),
            Ok(Err(e)) => {
                error!(error = %e, "Gemini API request failed");
                Err(GatewayError::network(format!("Request failed: {e}")))
            }
            Ok(Ok(response)) => Ok(response),
        }
    }

    /// Unary `generateContent`
    ///
    /// # Errors
    /// Returns `Upstream` for a non-success status, `Network`/`Timeout` for
    /// transport failures
    pub async fn generate(
        &self,
        api_key: &str,
        payload: &BackendPayload,
    ) -> GatewayResult<GeminiResponse> {
        let url = self.endpoint_url(payload.model(), false);
        debug!(model = %payload.model(), url = %url, "Sending generateContent request");

        let response = self
            .send(
                self.http
                    .post(&url)
                    .header(API_KEY_HEADER, api_key)
                    .json(&payload.body),
            )
            .await?;

        let status = response.status();
        let body = tokio::time::timeout(self.config.timeout, response.text())
            .await
            .map_err(|_| GatewayError::timeout(self.config.timeout))?
            .map_err(|e| GatewayError::network(format!("Failed to read response: {e}")))?;

        trace!(status = %status, body = %body, "Received Gemini response");

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            GatewayError::upstream(
                status.as_u16(),
                format!("Invalid response JSON: {e}"),
                Some(body),
            )
        })
    }

    /// Streaming `streamGenerateContent` as a stream of non-empty lines
    ///
    /// A non-success status is not an error here: the body is yielded as a
    /// single line without a `data:` prefix, for the relay to detect.
    ///
    /// # Errors
    /// Returns `Network`/`Timeout` when no response head arrives
    pub async fn stream_lines(
        &self,
        api_key: &str,
        payload: &BackendPayload,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<String>>> {
        let url = self.endpoint_url(payload.model(), true);
        debug!(model = %payload.model(), url = %url, "Sending streamGenerateContent request");

        let response = self
            .send(
                self.http
                    .post(&url)
                    .header(API_KEY_HEADER, api_key)
                    .json(&payload.body),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let line = error_line(status.as_u16(), &body);
            return Ok(futures::stream::once(async move { Ok(line) }).boxed());
        }

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = LineBuffer::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| {
                    GatewayError::stream_interrupted(format!("Stream error: {e}"))
                })?;
                buffer.extend(&chunk);
                while let Some(line) = buffer.next_line() {
                    yield line;
                }
            }

            if let Some(rest) = buffer.finish() {
                yield rest;
            }
        };

        Ok(stream.boxed())
    }

    /// Cheap credential check: fetch one model's metadata
    ///
    /// # Errors
    /// Returns the backend error when the key is rejected
    pub async fn probe(&self, api_key: &str) -> GatewayResult<()> {
        let url = format!("{}/{}", self.models_url(), self.config.probe_model);
        let response = self
            .send(self.http.get(&url).header(API_KEY_HEADER, api_key))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(parse_error(status.as_u16(), &body))
    }

    /// List backend models that support `generateContent`
    ///
    /// # Errors
    /// Returns the backend error on failure
    pub async fn list_models(&self, api_key: &str) -> GatewayResult<Vec<String>> {
        let response = self
            .send(self.http.get(self.models_url()).header(API_KEY_HEADER, api_key))
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        let list: GeminiModelList = serde_json::from_str(&body).map_err(|e| {
            GatewayError::upstream(status.as_u16(), format!("Invalid model list: {e}"), None)
        })?;

        Ok(list
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }
}

/// Turn an error response into an `Upstream` error
pub fn parse_error(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<GeminiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}"));
    GatewayError::upstream(status, message, Some(body.to_string()))
}

/// Splits a byte stream into non-empty lines
///
/// Bytes are held until a newline arrives, so a multi-byte character split
/// across network chunks is decoded whole.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: BytesMut,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw = self.pending.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Trailing text after the last newline
    fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Normalise an error body into a single JSON line carrying the status
fn error_line(status: u16, body: &str) -> String {
    match serde_json::from_str::<GeminiErrorBody>(body) {
        Ok(_) => body.replace(['\r', '\n'], ""),
        Err(_) => json!({"error": {"code": status, "message": body.trim()}}).to_string(),
    }
}
