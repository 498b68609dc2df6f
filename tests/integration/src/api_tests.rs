//! HTTP surface tests: both protocols, model lists, auth and admin

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_backend::*;
use serde_json::json;

#[tokio::test]
async fn test_openai_chat_completion() {
    let backend = MockGemini::start().await;
    backend.mock_generate(KEY_A, MODEL, "Hello from Gemini", 1).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;
    let response = gateway.post_json("/v1/chat/completions", &chat_request("Hi", false)).await;
    let body = assert_status(response, 200).await;

    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], MODEL);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello from Gemini");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 10);

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_hf_prefix_serves_chat() {
    let backend = MockGemini::start().await;
    backend.mock_generate(KEY_A, MODEL, "via hf", 1).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;
    let response = gateway.post_json("/hf/v1/chat/completions", &chat_request("Hi", false)).await;
    let body = assert_status(response, 200).await;
    assert_eq!(body["choices"][0]["message"]["content"], "via hf");
}

#[tokio::test]
async fn test_native_generate_content() {
    let backend = MockGemini::start().await;
    backend.mock_generate(KEY_A, MODEL, "native hello", 1).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;
    let response = gateway
        .post_json(&format!("/v1beta/models/{MODEL}:generateContent"), &native_request("Hi"))
        .await;
    let body = assert_status(response, 200).await;

    assert_eq!(body["candidates"][0]["content"]["role"], "model");
    assert_eq!(body["candidates"][0]["content"]["parts"][0]["text"], "native hello");
    assert_eq!(body["candidates"][0]["finishReason"], "STOP");
    assert_eq!(body["usageMetadata"]["totalTokenCount"], 10);
}

#[tokio::test]
async fn test_model_lists() {
    let backend = MockGemini::start().await;
    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;

    let body = assert_status(gateway.get("/v1/models").await, 200).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert!(ids.contains(&MODEL));

    let body = assert_status(gateway.get("/v1beta/models").await, 200).await;
    let names: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert!(names.contains(&"models/gemini-2.0-flash"));
}

#[tokio::test]
async fn test_unsupported_model_never_reaches_backend() {
    let backend = MockGemini::start().await;
    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;

    let mut request = chat_request("Hi", false);
    request["model"] = json!("gpt-4o");
    let body = assert_status(gateway.post_json("/v1/chat/completions", &request).await, 400).await;

    assert_eq!(body["error"]["type"], "model_not_supported");
    assert_eq!(backend.requests_with_key(KEY_A).await, 0);
}

#[tokio::test]
async fn test_invalid_json_uses_endpoint_schema() {
    let backend = MockGemini::start().await;
    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;

    let response = gateway
        .client
        .post(gateway.url(&format!("/v1beta/models/{MODEL}:generateContent")))
        .header("content-type", "application/json")
        .body("{broken")
        .send()
        .await
        .unwrap();
    let body = assert_status(response, 400).await;
    assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
    assert_eq!(body["error"]["code"], 400);
}

#[tokio::test]
async fn test_auth_required_when_enabled() {
    let backend = MockGemini::start().await;
    backend.mock_generate(KEY_A, MODEL, "authorized", 1).await;
    let gateway = TestGateway::start(with_auth(test_config(&backend.url(), &[KEY_A], 3, 3))).await;

    // Health stays public
    assert_status(gateway.get("/health").await, 200).await;

    let body = assert_status(gateway.get("/v1/models").await, 401).await;
    assert_eq!(body["error"]["type"], "authentication_error");

    let body = assert_status(
        gateway
            .get_with_headers("/v1beta/models", &[("x-goog-api-key", "wrong")])
            .await,
        401,
    )
    .await;
    assert_eq!(body["error"]["status"], "UNAUTHENTICATED");

    let bearer = format!("Bearer {CLIENT_TOKEN}");
    let response = gateway
        .post_json_with_headers(
            "/v1/chat/completions",
            &chat_request("Hi", false),
            &[("authorization", bearer.as_str())],
        )
        .await;
    let body = assert_status(response, 200).await;
    assert_eq!(body["choices"][0]["message"]["content"], "authorized");

    let query = format!("/v1beta/models?key={CLIENT_TOKEN}");
    assert_status(gateway.get(&query).await, 200).await;
}

#[tokio::test]
async fn test_health_reports_pool() {
    let backend = MockGemini::start().await;
    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 3)).await;

    let body = assert_status(gateway.get("/health").await, 200).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["credentials"]["total"], 2);
    assert_eq!(body["credentials"]["valid"], 2);
}

#[tokio::test]
async fn test_admin_pool_status_and_reset() {
    let backend = MockGemini::start().await;
    backend.mock_generate_error(KEY_A, MODEL, 400, "API key not valid", 1).await;
    backend.mock_generate(KEY_B, MODEL, "ok", 1).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 3)).await;
    assert_status(gateway.post_json("/v1/chat/completions", &chat_request("Hi", false)).await, 200).await;

    let body = assert_status(gateway.get("/admin/pool").await, 200).await;
    assert_eq!(body["size"], 2);
    assert_eq!(body["max_failures"], 1);
    assert_eq!(body["valid"].as_array().unwrap().len(), 1);
    assert_eq!(body["invalid"].as_array().unwrap().len(), 1);
    assert_eq!(body["invalid"][0]["failures"], 1);
    // Raw keys never leave the gateway
    assert!(!body.to_string().contains(KEY_A));

    let body = assert_status(
        gateway.post_json("/admin/pool/reset", &json!({"key": "AIzaNotPooled"})).await,
        404,
    )
    .await;
    assert!(body["error"]["message"].is_string());

    assert_status(gateway.post_json("/admin/pool/reset", &json!({"key": KEY_A})).await, 200).await;
    let body = assert_status(gateway.get("/admin/pool").await, 200).await;
    assert_eq!(body["valid"].as_array().unwrap().len(), 2);
    assert!(body["invalid"].as_array().unwrap().is_empty());
}
