//! Stream relay: backend SSE lines in, client SSE frames out.
//!
//! A relay run has three stages. The first line is peeked so a backend error
//! body fails the attempt before the client sees a byte. Data lines are then
//! decoded and translated, with text paced by the [`StreamOptimizer`].
//! Finally a synthetic terminal chunk closes the stream.

pub mod frame;
pub mod pacing;
pub mod sse;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use gateway_core::{ClientProtocol, CompletionResult, FinishReason, GatewayResult, StreamChunk};
use std::sync::Arc;
use tracing::debug;

use crate::google::ProtocolTranslator;

pub use frame::Framer;
pub use pacing::{PacingConfig, StreamOptimizer};

/// Converts backend line streams into client chunk or frame streams
#[derive(Debug, Clone)]
pub struct StreamRelay {
    translator: Arc<ProtocolTranslator>,
    optimizer: StreamOptimizer,
}

impl StreamRelay {
    /// Create a relay
    pub fn new(translator: Arc<ProtocolTranslator>, pacing: PacingConfig) -> Self {
        Self {
            translator,
            optimizer: StreamOptimizer::new(pacing),
        }
    }

    /// Peek the stream, then decode it into chunks ending with a terminal one
    ///
    /// # Errors
    /// Returns `StreamInit` when the backend answered with an error body
    pub async fn chunks<S>(
        &self,
        model: &str,
        protocol: ClientProtocol,
        lines: S,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<StreamChunk>>>
    where
        S: Stream<Item = GatewayResult<String>> + Send + Unpin + 'static,
    {
        let mut lines = sse::peek_stream(lines).await?;
        let translator = Arc::clone(&self.translator);
        let optimizer = self.optimizer.clone();
        let model = model.to_string();

        let stream = try_stream! {
            let mut saw_tool_call = false;
            let mut usage = None;

            while let Some(line) = lines.next().await {
                let Some(response) = sse::decode_line(&line?)? else {
                    continue;
                };

                let mut result = translator
                    .parse_response(&model, &response, true, protocol)
                    .await;
                if result.usage.is_some() {
                    usage = result.usage.take();
                }
                result.finish_reason = None;
                if result.is_empty() {
                    continue;
                }
                if !result.tool_calls.is_empty() {
                    saw_tool_call = true;
                }

                if optimizer.is_enabled() && result.is_text_only() {
                    let plan = optimizer.plan(&result.text);
                    let last = plan.pieces.len().saturating_sub(1);
                    for (index, piece) in plan.pieces.into_iter().enumerate() {
                        yield StreamChunk::content(CompletionResult::text(piece));
                        if index < last {
                            tokio::time::sleep(plan.delay).await;
                        }
                    }
                } else {
                    yield StreamChunk::content(result);
                }
            }

            let reason = if saw_tool_call {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            };
            debug!(model = %model, finish_reason = reason.as_str(), "Backend stream completed");
            yield StreamChunk::terminal(reason, usage);
        };

        Ok(stream.boxed())
    }

    /// Like [`chunks`](Self::chunks), rendered as client SSE frames
    ///
    /// OpenAI streams end with the `[DONE]` sentinel after the terminal chunk.
    ///
    /// # Errors
    /// Returns `StreamInit` when the backend answered with an error body
    pub async fn frames<S>(
        &self,
        model: &str,
        protocol: ClientProtocol,
        lines: S,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<String>>>
    where
        S: Stream<Item = GatewayResult<String>> + Send + Unpin + 'static,
    {
        let mut chunks = self.chunks(model, protocol, lines).await?;
        let mut framer = Framer::new(protocol, model);

        let stream = try_stream! {
            while let Some(chunk) = chunks.next().await {
                yield framer.frame(&chunk?);
            }
            if let Some(end) = framer.end_frame() {
                yield end.to_string();
            }
        };

        Ok(stream.boxed())
    }
}
