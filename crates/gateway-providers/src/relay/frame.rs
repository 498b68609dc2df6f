//! Client-protocol SSE framing.

use gateway_core::{ClientProtocol, GatewayError, StreamChunk};
use serde_json::Value;

use crate::{native, openai};

/// Wrap a JSON value as one SSE event
pub fn sse_event(body: &Value) -> String {
    format!("data: {body}\n\n")
}

/// Renders stream chunks for one client stream
#[derive(Debug, Clone)]
pub struct Framer {
    protocol: ClientProtocol,
    model: String,
    id: String,
    created: i64,
    tool_calls_sent: usize,
}

impl Framer {
    /// Framer for one response stream; all OpenAI chunks share an id
    pub fn new(protocol: ClientProtocol, model: impl Into<String>) -> Self {
        Self {
            protocol,
            model: model.into(),
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            created: chrono::Utc::now().timestamp(),
            tool_calls_sent: 0,
        }
    }

    /// Protocol being framed
    pub fn protocol(&self) -> ClientProtocol {
        self.protocol
    }

    /// Frame one chunk; OpenAI tool-call indexes keep counting across chunks
    pub fn frame(&mut self, chunk: &StreamChunk) -> String {
        let body = match self.protocol {
            ClientProtocol::OpenAi => {
                let body = openai::chunk_body(
                    &self.id,
                    &self.model,
                    self.created,
                    self.tool_calls_sent,
                    &chunk.result,
                );
                self.tool_calls_sent += chunk.result.tool_calls.len();
                body
            }
            ClientProtocol::Native => native::response_body(&chunk.result),
        };
        sse_event(&body)
    }

    /// Closing sentinel, for protocols that have one
    pub fn end_frame(&self) -> Option<&'static str> {
        self.protocol.has_end_sentinel().then_some(openai::DONE_FRAME)
    }

    /// Terminal error event
    pub fn error_frame(&self, error: &GatewayError) -> String {
        let body = match self.protocol {
            ClientProtocol::OpenAi => openai::error_body(error),
            ClientProtocol::Native => native::error_body(error),
        };
        sse_event(&body)
    }
}
