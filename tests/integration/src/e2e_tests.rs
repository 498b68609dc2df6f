//! End-to-end streaming flows through the real server

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_backend::*;

#[tokio::test]
async fn test_openai_stream_end_to_end() {
    let backend = MockGemini::start().await;
    backend.mock_stream(KEY_A, MODEL, &["Hello", ", ", "world"]).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;
    let response = gateway.post_json("/v1/chat/completions", &chat_request("Hi", true)).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let body = response.text().await.unwrap();

    assert_eq!(openai_stream_text(&body), "Hello, world");
    assert!(body.ends_with("data: [DONE]\n\n"));

    let events = sse_events(&body);
    let id = events[0]["id"].as_str().unwrap();
    assert!(events.iter().all(|e| e["id"] == id));
    assert!(events.iter().all(|e| e["choices"][0]["delta"]["role"] == "assistant"));

    let last = events.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    let finishes = events
        .iter()
        .filter(|e| !e["choices"][0]["finish_reason"].is_null())
        .count();
    assert_eq!(finishes, 1);
}

#[tokio::test]
async fn test_native_stream_end_to_end() {
    let backend = MockGemini::start().await;
    backend.mock_stream(KEY_A, MODEL, &["native ", "stream"]).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;
    let (status, body) = gateway
        .post_streaming(
            &format!("/v1beta/models/{MODEL}:streamGenerateContent?alt=sse"),
            &native_request("Hi"),
        )
        .await;
    assert_eq!(status, 200);
    assert!(!body.contains("[DONE]"));

    let events = sse_events(&body);
    let text: String = events
        .iter()
        .filter_map(|e| e["candidates"][0]["content"]["parts"][0]["text"].as_str())
        .collect();
    assert_eq!(text, "native stream");
    assert_eq!(events.last().unwrap()["candidates"][0]["finishReason"], "STOP");
}

#[tokio::test]
async fn test_stream_start_error_fails_over() {
    let backend = MockGemini::start().await;
    backend.mock_stream_error(KEY_A, MODEL, 403, "Permission denied").await;
    backend.mock_stream(KEY_B, MODEL, &["from B"]).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 3)).await;
    let (status, body) = gateway.post_streaming("/v1/chat/completions", &chat_request("Hi", true)).await;

    assert_eq!(status, 200);
    assert_eq!(openai_stream_text(&body), "from B");
    assert!(!body.contains("\"error\""));

    let key_a = gateway.state.pool.find(KEY_A).unwrap();
    assert!(!gateway.state.pool.is_valid(&key_a));
}

#[tokio::test]
async fn test_stream_start_exhaustion_is_a_plain_error() {
    let backend = MockGemini::start().await;
    backend.mock_stream_error(KEY_A, MODEL, 429, "Resource has been exhausted").await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 2)).await;
    let response = gateway.post_json("/v1/chat/completions", &chat_request("Hi", true)).await;

    // Nothing was streamed, so the client gets an ordinary JSON error
    let body = assert_status(response, 429).await;
    assert_eq!(body["error"]["code"], 429);
    assert_eq!(backend.requests_with_key(KEY_A).await, 2);
}

#[tokio::test]
async fn test_mid_stream_failure_restarts_on_next_key() {
    let backend = MockGemini::start().await;
    backend.mock_stream_broken(KEY_A, MODEL, "Hel").await;
    backend.mock_stream(KEY_B, MODEL, &["Hello", " world"]).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 3)).await;
    let (status, body) = gateway.post_streaming("/v1/chat/completions", &chat_request("Hi", true)).await;

    assert_eq!(status, 200);
    // The partial output already sent stays; the restart follows it
    assert_eq!(openai_stream_text(&body), "HelHello world");
    assert!(!body.contains("\"error\""));
    assert!(body.ends_with("data: [DONE]\n\n"));
    assert_eq!(body.matches("[DONE]").count(), 1);

    assert_eq!(backend.requests_with_key(KEY_A).await, 1);
    assert_eq!(backend.requests_with_key(KEY_B).await, 1);
}

#[tokio::test]
async fn test_mid_stream_exhaustion_ends_with_error_frame() {
    let backend = MockGemini::start().await;
    backend.mock_stream_broken(KEY_A, MODEL, "partial").await;
    backend.mock_stream_broken(KEY_B, MODEL, "partial").await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 2)).await;
    let (status, body) = gateway.post_streaming("/v1/chat/completions", &chat_request("Hi", true)).await;

    // Headers were already sent, so the failure arrives in-band
    assert_eq!(status, 200);
    assert_eq!(openai_stream_text(&body), "partialpartial");
    let events = sse_events(&body);
    let last = events.last().unwrap();
    assert!(last["error"]["message"].is_string());
    assert!(body.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn test_native_mid_stream_exhaustion_has_no_sentinel() {
    let backend = MockGemini::start().await;
    backend.mock_stream_broken(KEY_A, MODEL, "partial").await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 1)).await;
    let (status, body) = gateway
        .post_streaming(
            &format!("/v1beta/models/{MODEL}:streamGenerateContent?alt=sse"),
            &native_request("Hi"),
        )
        .await;

    assert_eq!(status, 200);
    let events = sse_events(&body);
    assert_eq!(events.first().unwrap()["candidates"][0]["content"]["parts"][0]["text"], "partial");
    let last = events.last().unwrap();
    assert!(last["error"]["status"].is_string());
    assert!(!body.contains("[DONE]"));
}
