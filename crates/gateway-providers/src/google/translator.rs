//! Translation between the unified model and the backend schema.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use gateway_core::{
    ChatRequest, ClientProtocol, CompletionResult, FinishReason, NativeFunctionCall,
    OpenAiFunction, OpenAiToolCall, ToolCalls, UploadSink, Usage,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::payload::{build_payload, BackendPayload};
use super::wire::{GeminiCandidate, GeminiInlineData, GeminiResponse, GeminiUsageMetadata};

/// Text returned when the backend produced no candidate at all
pub const NO_CONTENT_PLACEHOLDER: &str = "No response content was returned by the upstream model.";

/// Text substituted for an image that could not be uploaded
pub const UPLOAD_FAILED_PLACEHOLDER: &str = "[image upload failed]";

/// Translation switches
#[derive(Debug, Clone, Default)]
pub struct TranslatorConfig {
    /// Inject the code execution tool where allowed
    pub code_execution: bool,
    /// Surface model reasoning to clients
    pub show_thinking: bool,
    /// Append grounding sources to answers
    pub show_search_link: bool,
    /// Models that reason by default
    pub thinking_models: Vec<String>,
    /// Per-model reasoning budgets
    pub thinking_budgets: HashMap<String, i32>,
}

/// Converts unified requests to backend payloads and backend responses to
/// protocol-neutral results
pub struct ProtocolTranslator {
    config: TranslatorConfig,
    uploader: Arc<dyn UploadSink>,
}

impl std::fmt::Debug for ProtocolTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolTranslator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProtocolTranslator {
    /// Create a translator
    pub fn new(config: TranslatorConfig, uploader: Arc<dyn UploadSink>) -> Self {
        Self { config, uploader }
    }

    /// Translation switches in effect
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Build the backend payload for `model`
    pub fn build_payload(&self, model: &str, request: &ChatRequest) -> BackendPayload {
        build_payload(&self.config, model, request)
    }

    /// Parse one backend response, or one streamed fragment of it
    pub async fn parse_response(
        &self,
        model: &str,
        response: &GeminiResponse,
        streaming: bool,
        protocol: ClientProtocol,
    ) -> CompletionResult {
        let usage = response.usage_metadata.as_ref().map(convert_usage);

        let Some(candidate) = response.candidates.first() else {
            if streaming {
                return CompletionResult {
                    usage,
                    ..CompletionResult::default()
                };
            }

            let blocked = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref());
            warn!(model = %model, block_reason = ?blocked, "Backend returned no candidates");
            return CompletionResult {
                text: NO_CONTENT_PLACEHOLDER.to_string(),
                finish_reason: Some(if blocked.is_some() {
                    FinishReason::ContentFilter
                } else {
                    FinishReason::Stop
                }),
                usage,
                ..CompletionResult::default()
            };
        };

        let mut text = String::new();
        let mut reasoning = String::new();
        let mut native_calls: Vec<NativeFunctionCall> = Vec::new();

        let parts = candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();
        if parts.is_empty() {
            warn!(
                model = %model,
                finish_reason = ?candidate.finish_reason,
                "Candidate carried no parts"
            );
        }

        for part in parts {
            if let Some(fragment) = &part.text {
                if part.thought == Some(true) {
                    if self.config.show_thinking {
                        reasoning.push_str(fragment);
                    }
                } else {
                    text.push_str(fragment);
                }
            } else if let Some(inline) = &part.inline_data {
                self.render_inline(model, inline, &mut text).await;
            } else if let Some(call) = &part.function_call {
                native_calls.push(NativeFunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                });
            } else if let Some(code) = &part.executable_code {
                let language = code.language.as_deref().unwrap_or("").to_lowercase();
                let _ = write!(text, "\n```{language}\n{}\n```\n", code.code.trim_end());
            } else if let Some(result) = &part.code_execution_result {
                if let Some(output) = result.output.as_deref().filter(|o| !o.is_empty()) {
                    let _ = write!(text, "\n```output\n{}\n```\n", output.trim_end());
                }
            } else {
                debug!(model = %model, "Skipping unrecognised part");
            }
        }

        if self.config.show_search_link {
            render_sources(candidate, &mut text);
        }

        let finish_reason = if native_calls.is_empty() {
            candidate.finish_reason.as_deref().map(map_finish_reason)
        } else {
            Some(FinishReason::ToolCalls)
        };

        let tool_calls = match protocol {
            ClientProtocol::Native => ToolCalls::Native(native_calls),
            ClientProtocol::OpenAi => {
                ToolCalls::OpenAi(native_calls.iter().map(to_openai_call).collect())
            }
        };

        CompletionResult {
            text,
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
            tool_calls,
            finish_reason,
            usage,
        }
    }

    async fn render_inline(&self, model: &str, inline: &GeminiInlineData, text: &mut String) {
        let bytes = match BASE64.decode(inline.data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(model = %model, error = %e, "Inline data is not valid base64");
                return;
            }
        };

        if inline.mime_type.starts_with("text/") {
            text.push_str(&String::from_utf8_lossy(&bytes));
            return;
        }

        let filename = format!("{}.{}", Uuid::new_v4().simple(), extension_for(&inline.mime_type));
        match self.uploader.upload(Bytes::from(bytes), &filename).await {
            Ok(url) => {
                let _ = write!(text, "\n\n![image]({url})\n\n");
            }
            Err(e) => {
                warn!(model = %model, error = %e, mime_type = %inline.mime_type, "Image upload failed");
                text.push_str(UPLOAD_FAILED_PLACEHOLDER);
            }
        }
    }
}

/// Map a backend finish reason
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Stop,
    }
}

/// Synthesize an OpenAI tool call from a native one
pub fn to_openai_call(call: &NativeFunctionCall) -> OpenAiToolCall {
    OpenAiToolCall {
        id: format!("call_{}", Uuid::new_v4().simple()),
        call_type: "function".to_string(),
        function: OpenAiFunction {
            name: call.name.clone(),
            arguments: stringify_args(&call.name, &call.args),
        },
    }
}

/// JSON-encode call arguments; anything that is not an object becomes `{}`
fn stringify_args(name: &str, args: &Value) -> String {
    match args {
        Value::Object(_) => args.to_string(),
        Value::Null => "{}".to_string(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Object(_)) => parsed.to_string(),
            _ => {
                warn!(function = %name, "Function arguments are not a JSON object");
                "{}".to_string()
            }
        },
        _ => {
            warn!(function = %name, "Function arguments are not a JSON object");
            "{}".to_string()
        }
    }
}

fn convert_usage(metadata: &GeminiUsageMetadata) -> Usage {
    let prompt_tokens = metadata.prompt_token_count.unwrap_or(0);
    let completion_tokens = metadata.candidates_token_count.unwrap_or(0);
    let reasoning_tokens = metadata.thoughts_token_count.unwrap_or(0);
    Usage {
        prompt_tokens,
        completion_tokens,
        reasoning_tokens,
        total_tokens: metadata
            .total_token_count
            .unwrap_or(prompt_tokens + completion_tokens + reasoning_tokens),
    }
}

fn render_sources(candidate: &GeminiCandidate, text: &mut String) {
    let sources: Vec<_> = candidate
        .grounding_metadata
        .iter()
        .flat_map(|g| g.grounding_chunks.iter())
        .filter_map(|chunk| chunk.web.as_ref())
        .filter_map(|web| {
            let uri = web.uri.as_deref()?;
            Some((web.title.as_deref().unwrap_or(uri), uri))
        })
        .collect();

    if sources.is_empty() {
        return;
    }

    text.push_str("\n\n**Sources**\n");
    for (title, uri) in sources {
        let _ = writeln!(text, "- [{title}]({uri})");
    }
}

fn extension_for(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        other => other
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .filter(|s| !s.is_empty())
            .unwrap_or("bin"),
    }
}
