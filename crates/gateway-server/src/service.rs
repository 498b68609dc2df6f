//! Chat service facade.
//!
//! Composes the catalog check, payload translation, the backend client and
//! the stream relay inside the retry orchestrator. Handlers for both client
//! protocols go through here.

use futures::stream::BoxStream;
use gateway_core::{ChatRequest, CompletionResult, GatewayError, GatewayResult};
use gateway_providers::relay::Framer;
use gateway_routing::Credential;
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

/// Entry point for chat requests
#[derive(Debug, Clone)]
pub struct ChatService {
    state: AppState,
}

impl ChatService {
    /// Create a service over shared state
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Catalog and field checks run before any credential is spent
    ///
    /// # Errors
    /// Returns `UnsupportedModel` or `Validation`
    pub fn admit(&self, request: &ChatRequest) -> GatewayResult<()> {
        if !self.state.catalog.is_model_supported(&request.model) {
            return Err(GatewayError::unsupported_model(&request.model));
        }
        request.validate()
    }

    /// Unary completion with failover
    ///
    /// # Errors
    /// Returns admission errors, non-retryable backend errors, or
    /// `RetriesExhausted`
    pub async fn complete(&self, request: ChatRequest) -> GatewayResult<CompletionResult> {
        self.admit(&request)?;

        let payload = Arc::new(self.state.translator.build_payload(&request.model, &request));
        let model = request.model.clone();
        let protocol = request.protocol;
        debug!(model = %model, backend_model = %payload.model(), "Dispatching unary request");

        let client = self.state.client.clone();
        let translator = Arc::clone(&self.state.translator);
        let unit_model = model.clone();

        let result = self
            .state
            .orchestrator
            .execute(&model, self.state.max_retries(), move |credential: Credential| {
                let client = client.clone();
                let translator = Arc::clone(&translator);
                let payload = Arc::clone(&payload);
                let model = unit_model.clone();
                async move {
                    let response = client.generate(credential.expose(), &payload).await?;
                    Ok::<_, GatewayError>(
                        translator
                            .parse_response(&model, &response, false, protocol)
                            .await,
                    )
                }
            })
            .await?;

        info!(
            model = %model,
            finish_reason = ?result.finish_reason,
            tool_calls = result.tool_calls.len(),
            "Completion finished"
        );
        Ok(result)
    }

    /// Streaming completion as ready-to-send SSE frames
    ///
    /// Errors before the first frame are returned; later failures are retried
    /// by restarting the backend stream, and an exhausted budget ends the
    /// stream with an error frame.
    ///
    /// # Errors
    /// Returns admission errors, or the final error if no stream could be
    /// opened
    pub async fn stream(&self, request: ChatRequest) -> GatewayResult<BoxStream<'static, String>> {
        self.admit(&request)?;

        let payload = Arc::new(self.state.translator.build_payload(&request.model, &request));
        let model = request.model.clone();
        let protocol = request.protocol;
        debug!(model = %model, backend_model = %payload.model(), "Dispatching stream request");

        let client = self.state.client.clone();
        let relay = self.state.relay.clone();
        let unit_model = model.clone();

        let unit = move |credential: Credential| {
            let client = client.clone();
            let relay = relay.clone();
            let payload = Arc::clone(&payload);
            let model = unit_model.clone();
            async move {
                let lines = client.stream_lines(credential.expose(), &payload).await?;
                relay.frames(&model, protocol, lines).await
            }
        };

        let framer = Framer::new(protocol, &model);
        let error_frame = move |error: &GatewayError| terminal_error_frame(&framer, error);

        self.state
            .orchestrator
            .execute_stream(&model, self.state.max_retries(), unit, error_frame)
            .await
    }
}

/// Error event, followed by the end sentinel where the protocol has one
fn terminal_error_frame(framer: &Framer, error: &GatewayError) -> String {
    let mut frame = framer.error_frame(error);
    if let Some(end) = framer.end_frame() {
        frame.push_str(end);
    }
    frame
}
