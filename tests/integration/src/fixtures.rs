//! Test fixtures: keys, configuration and request bodies

use gateway_config::GatewayConfig;
use secrecy::SecretString;
use serde_json::{json, Value};

/// Model every fixture targets
pub const MODEL: &str = "gemini-2.0-flash";

/// First pooled key
pub const KEY_A: &str = "AIzaSyTestKeyAlpha00000000000000000001";
/// Second pooled key
pub const KEY_B: &str = "AIzaSyTestKeyBravo00000000000000000002";
/// Client token accepted when auth is on
pub const CLIENT_TOKEN: &str = "sk-relay-test";

/// Gateway configuration pointed at `backend_url`
///
/// Pacing and the background health checker are off so tests are fast and
/// deterministic.
pub fn test_config(backend_url: &str, keys: &[&str], max_failures: u32, max_retries: u32) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.credentials.api_keys = keys.iter().map(|k| SecretString::new((*k).to_string())).collect();
    config.credentials.max_failures = max_failures;
    config.credentials.max_retries = max_retries;
    config.backend.base_url = backend_url.to_string();
    config.stream.optimize = false;
    config.health_check.enabled = false;
    config.models.supported = vec![MODEL.into(), "gemini-2.5-pro".into()];
    config
}

/// Turn on client token checks
pub fn with_auth(mut config: GatewayConfig) -> GatewayConfig {
    config.auth.enabled = true;
    config.auth.allowed_tokens = vec![SecretString::new(CLIENT_TOKEN.into())];
    config
}

/// OpenAI chat request body
pub fn chat_request(content: &str, stream: bool) -> Value {
    json!({
        "model": MODEL,
        "messages": [
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": content}
        ],
        "stream": stream
    })
}

/// Native `generateContent` body
pub fn native_request(text: &str) -> Value {
    json!({
        "contents": [{"role": "user", "parts": [{"text": text}]}],
        "generationConfig": {"temperature": 0.3}
    })
}
