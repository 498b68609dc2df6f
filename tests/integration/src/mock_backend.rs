//! Mock Gemini backend for integration testing
//!
//! Responses are keyed on the `x-goog-api-key` header so each test can give
//! every pooled credential its own behavior.

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Key header the gateway sends upstream
pub const KEY_HEADER: &str = "x-goog-api-key";

/// Mock Gemini API server
pub struct MockGemini {
    /// Underlying wiremock server
    pub server: MockServer,
}

impl MockGemini {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to configure as the backend
    pub fn url(&self) -> String {
        self.server.uri()
    }

    fn generate_path(model: &str) -> String {
        format!("/v1beta/models/{model}:generateContent")
    }

    fn stream_path(model: &str) -> String {
        format!("/v1beta/models/{model}:streamGenerateContent")
    }

    /// Unary success for `key`, expected exactly `times` times
    pub async fn mock_generate(&self, key: &str, model: &str, text: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path(Self::generate_path(model)))
            .and(header(KEY_HEADER, key))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(text)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Unary error for `key`, expected exactly `times` times
    pub async fn mock_generate_error(&self, key: &str, model: &str, status: u16, message: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path(Self::generate_path(model)))
            .and(header(KEY_HEADER, key))
            .respond_with(ResponseTemplate::new(status).set_body_json(gemini_error(status, message)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Complete SSE stream of `chunks` for `key`
    pub async fn mock_stream(&self, key: &str, model: &str, chunks: &[&str]) {
        Mock::given(method("POST"))
            .and(path(Self::stream_path(model)))
            .and(query_param("alt", "sse"))
            .and(header(KEY_HEADER, key))
            .respond_with(sse_response(&stream_body(chunks, true)))
            .mount(&self.server)
            .await;
    }

    /// Stream request rejected before any data, as a plain error status
    pub async fn mock_stream_error(&self, key: &str, model: &str, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path(Self::stream_path(model)))
            .and(header(KEY_HEADER, key))
            .respond_with(ResponseTemplate::new(status).set_body_json(gemini_error(status, message)))
            .mount(&self.server)
            .await;
    }

    /// Stream that emits `partial` and then an error object
    pub async fn mock_stream_broken(&self, key: &str, model: &str, partial: &str) {
        let mut body = stream_body(&[partial], false);
        body.push_str(&gemini_error(503, "The model is overloaded").to_string());
        body.push('\n');

        Mock::given(method("POST"))
            .and(path(Self::stream_path(model)))
            .and(header(KEY_HEADER, key))
            .respond_with(sse_response(&body))
            .mount(&self.server)
            .await;
    }

    /// Model metadata lookup used by the health probe
    pub async fn mock_probe(&self, key: &str, model: &str, status: u16) {
        let body = if status == 200 {
            json!({"name": format!("models/{model}")})
        } else {
            gemini_error(status, "API key not valid. Please pass a valid API key.")
        };
        Mock::given(method("GET"))
            .and(path(format!("/v1beta/models/{model}")))
            .and(header(KEY_HEADER, key))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Requests the backend received with `key`
    pub async fn requests_with_key(&self, key: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| {
                r.headers
                    .get(KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    == Some(key)
            })
            .count()
    }
}

fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream")
}

/// Unary `generateContent` body
pub fn gemini_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {
            "promptTokenCount": 4,
            "candidatesTokenCount": 6,
            "totalTokenCount": 10
        }
    })
}

/// Google-style error body
pub fn gemini_error(status: u16, message: &str) -> Value {
    let name = match status {
        400 => "INVALID_ARGUMENT",
        403 => "PERMISSION_DENIED",
        429 => "RESOURCE_EXHAUSTED",
        503 => "UNAVAILABLE",
        _ => "INTERNAL",
    };
    json!({"error": {"code": status, "message": message, "status": name}})
}

/// SSE body with one event per chunk, the last one carrying `STOP` if
/// `finished`
pub fn stream_body(chunks: &[&str], finished: bool) -> String {
    let last = chunks.len().saturating_sub(1);
    chunks
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let mut candidate = json!({"content": {"role": "model", "parts": [{"text": text}]}});
            if finished && index == last {
                candidate["finishReason"] = json!("STOP");
            }
            format!("data: {}\r\n\r\n", json!({"candidates": [candidate]}))
        })
        .collect()
}
