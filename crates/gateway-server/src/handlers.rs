//! HTTP request handlers for the gateway API.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::{BoxStream, StreamExt};
use gateway_core::{ChatRequest, ClientProtocol, GatewayError};
use gateway_providers::{native, openai, NativeGenerateRequest, OpenAiChatRequest};
use gateway_routing::Credential;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::{
    error::ApiError,
    extractors::{JsonBody, RequestId},
    health::HealthResponse,
    service::ChatService,
    state::AppState,
};

/// Native unary action
const GENERATE_ACTION: &str = "generateContent";
/// Native streaming action
const STREAM_ACTION: &str = "streamGenerateContent";

/// Liveness with pool summary
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::from_pool(&state.pool))
}

/// OpenAI model list
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(openai::model_list(&state.catalog.models()))
}

/// Native model list
pub async fn list_native_models(State(state): State<AppState>) -> Json<Value> {
    Json(native::model_list(&state.catalog.models()))
}

/// OpenAI chat completions, unary or streaming
#[instrument(skip(state, body), fields(model = %body.model))]
pub async fn chat_completion(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<OpenAiChatRequest>,
) -> Result<Response, ApiError> {
    let request = body.into_chat_request()?;
    dispatch(state, request_id, request).await
}

/// Native `models/{model}:generateContent` and `:streamGenerateContent`
#[instrument(skip(state, body))]
pub async fn native_generate(
    State(state): State<AppState>,
    Path(model_action): Path<String>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<NativeGenerateRequest>,
) -> Result<Response, ApiError> {
    let native_error = |e: GatewayError| ApiError::from(e).for_protocol(ClientProtocol::Native);

    let (model, action) = model_action.rsplit_once(':').ok_or_else(|| {
        ApiError::not_found(format!("Unknown endpoint: models/{model_action}"))
            .for_protocol(ClientProtocol::Native)
    })?;
    let stream = match action {
        GENERATE_ACTION => false,
        STREAM_ACTION => true,
        other => {
            return Err(ApiError::not_found(format!("Unknown method: {other}"))
                .for_protocol(ClientProtocol::Native));
        }
    };

    let request = body.into_chat_request(model, stream).map_err(native_error)?;
    dispatch(state, request_id, request).await
}

async fn dispatch(
    state: AppState,
    request_id: String,
    request: ChatRequest,
) -> Result<Response, ApiError> {
    let protocol = request.protocol;
    let model = request.model.clone();
    let to_api = |e: GatewayError| ApiError::from(e).for_protocol(protocol);
    let timeout = state.config.server.request_timeout;
    let service = ChatService::new(state);
    let start = Instant::now();

    debug!(
        request_id = %request_id,
        model = %model,
        streaming = request.stream,
        protocol = ?protocol,
        "Processing chat request"
    );

    if request.stream {
        let frames = service.stream(request).await.map_err(to_api)?;
        info!(request_id = %request_id, model = %model, "Stream opened");
        return Ok(sse_response(frames));
    }

    let result = tokio::time::timeout(timeout, service.complete(request))
        .await
        .map_err(|_| to_api(GatewayError::timeout(timeout)))?
        .map_err(to_api)?;

    info!(
        request_id = %request_id,
        model = %model,
        duration_ms = start.elapsed().as_millis() as u64,
        "Chat request completed"
    );

    let body = match protocol {
        ClientProtocol::OpenAi => openai::completion_body(&model, &result),
        ClientProtocol::Native => native::response_body(&result),
    };
    Ok(Json(body).into_response())
}

/// Response over pre-framed SSE events
fn sse_response(frames: BoxStream<'static, String>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames.map(Ok::<_, Infallible>)),
    )
        .into_response()
}

/// One credential in the admin view
#[derive(Debug, Serialize)]
pub struct CredentialView {
    /// Masked key
    pub key: String,
    /// Failure count
    pub failures: u32,
}

/// Admin pool view
#[derive(Debug, Serialize)]
pub struct PoolView {
    /// Credentials in the pool
    pub size: usize,
    /// Failure threshold
    pub max_failures: u32,
    /// Below the threshold
    pub valid: Vec<CredentialView>,
    /// At the threshold
    pub invalid: Vec<CredentialView>,
}

fn views(entries: impl IntoIterator<Item = (Credential, u32)>) -> Vec<CredentialView> {
    let mut views: Vec<CredentialView> = entries
        .into_iter()
        .map(|(credential, failures)| CredentialView {
            key: credential.masked(),
            failures,
        })
        .collect();
    views.sort_by(|a, b| a.key.cmp(&b.key));
    views
}

/// Pool status with masked keys
pub async fn pool_status(State(state): State<AppState>) -> Json<PoolView> {
    let status = state.pool.status();
    Json(PoolView {
        size: state.pool.len(),
        max_failures: state.pool.max_failures(),
        valid: views(status.valid),
        invalid: views(status.invalid),
    })
}

/// Reset request body
#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    /// Raw key to reset; absent resets every key
    #[serde(default)]
    pub key: Option<String>,
}

/// Reset one key or all keys
pub async fn pool_reset(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: ResetRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))?
    };

    match request.key {
        Some(key) => {
            let credential = state
                .pool
                .find(key.trim())
                .ok_or_else(|| ApiError::not_found("Key is not in the pool"))?;
            state.pool.reset(&credential);
            info!(credential = %credential, "Credential reset by admin");
            Ok(Json(json!({ "reset": [credential.masked()] })))
        }
        None => {
            state.pool.reset_all();
            info!(size = state.pool.len(), "All credentials reset by admin");
            let mut keys: Vec<String> =
                state.pool.credentials().iter().map(Credential::masked).collect();
            keys.sort();
            Ok(Json(json!({ "reset": keys })))
        }
    }
}
