//! Credential failover, exhaustion, hot reload and health probing

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_backend::*;
use gateway_server::HealthChecker;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_failover_to_next_key_and_stay_there() {
    let backend = MockGemini::start().await;
    backend.mock_generate_error(KEY_A, MODEL, 400, "API key not valid", 1).await;
    backend.mock_generate(KEY_B, MODEL, "from B", 2).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 3)).await;

    let body = assert_status(gateway.post_json("/v1/chat/completions", &chat_request("one", false)).await, 200).await;
    assert_eq!(body["choices"][0]["message"]["content"], "from B");

    let pool = &gateway.state.pool;
    let key_a = pool.find(KEY_A).unwrap();
    assert!(!pool.is_valid(&key_a));
    assert_eq!(pool.failure_count(&key_a), Some(1));

    // A is at the threshold, so rotation skips it
    let body = assert_status(gateway.post_json("/v1/chat/completions", &chat_request("two", false)).await, 200).await;
    assert_eq!(body["choices"][0]["message"]["content"], "from B");

    assert_eq!(backend.requests_with_key(KEY_A).await, 1);
    assert_eq!(backend.requests_with_key(KEY_B).await, 2);
}

#[tokio::test]
async fn test_exhausted_retries_report_last_status() {
    let backend = MockGemini::start().await;
    backend.mock_generate_error(KEY_A, MODEL, 429, "Resource has been exhausted", 1).await;
    backend.mock_generate_error(KEY_B, MODEL, 429, "Resource has been exhausted", 1).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 2)).await;

    let body = assert_status(gateway.post_json("/v1/chat/completions", &chat_request("Hi", false)).await, 429).await;
    assert_eq!(body["error"]["type"], "rate_limited");
    assert_eq!(body["error"]["code"], 429);

    let status = gateway.state.pool.status();
    assert!(status.valid.is_empty());
    assert_eq!(status.invalid.len(), 2);
}

#[tokio::test]
async fn test_exhaustion_in_native_schema() {
    let backend = MockGemini::start().await;
    backend.mock_generate_error(KEY_A, MODEL, 503, "The model is overloaded", 2).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 2)).await;
    let response = gateway
        .post_json(&format!("/v1beta/models/{MODEL}:generateContent"), &native_request("Hi"))
        .await;
    let body = assert_status(response, 503).await;

    assert_eq!(body["error"]["status"], "UNAVAILABLE");
    assert!(body["error"]["message"].as_str().unwrap().contains("overloaded"));
}

#[tokio::test]
async fn test_hot_reload_replaces_keys() {
    let backend = MockGemini::start().await;
    backend.mock_generate(KEY_B, MODEL, "reloaded", 2).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A], 3, 3)).await;
    gateway.state.pool.hot_reload([KEY_B]).unwrap();
    assert_eq!(gateway.state.pool.len(), 1);
    assert!(gateway.state.pool.find(KEY_A).is_none());

    for _ in 0..2 {
        let body = assert_status(gateway.post_json("/v1/chat/completions", &chat_request("Hi", false)).await, 200).await;
        assert_eq!(body["choices"][0]["message"]["content"], "reloaded");
    }
    assert_eq!(backend.requests_with_key(KEY_A).await, 0);
}

#[tokio::test]
async fn test_health_sweep_restores_recovered_key() {
    let backend = MockGemini::start().await;
    backend.mock_generate_error(KEY_A, MODEL, 403, "Permission denied", 1).await;
    backend.mock_generate(KEY_B, MODEL, "fine", 1).await;
    backend.mock_probe(KEY_A, MODEL, 200).await;

    let gateway = TestGateway::start(test_config(&backend.url(), &[KEY_A, KEY_B], 1, 3)).await;
    assert_status(gateway.post_json("/v1/chat/completions", &chat_request("Hi", false)).await, 200).await;
    assert_eq!(gateway.state.pool.status().invalid.len(), 1);

    let checker = HealthChecker::new(
        Arc::clone(&gateway.state.pool),
        gateway.state.client.clone(),
        Duration::from_secs(300),
    );
    let report = checker.sweep().await;
    assert_eq!(report.probed, 1);
    assert_eq!(report.restored, 1);

    let body = assert_status(gateway.get("/health").await, 200).await;
    assert_eq!(body["credentials"]["valid"], 2);
}
