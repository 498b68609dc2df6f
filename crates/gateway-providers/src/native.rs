//! Native `generateContent` schema.
//!
//! Clients speaking the backend's own protocol send the backend request body
//! with the model in the URL path. The body is still converted into the
//! unified request so tool, safety and thinking rules apply uniformly.

use gateway_core::{
    BuiltinTool, ChatRequest, ClientProtocol, CompletionResult, DeclaredTools, GatewayError,
    GatewayResult, Message, Part, Role, SafetySetting, ThinkingConfig, ToolCalls,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::google::wire::{GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiTool};

/// Native request body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeGenerateRequest {
    /// Conversation turns
    #[serde(default)]
    pub contents: Vec<GeminiContent>,
    /// Generation controls
    #[serde(default)]
    pub generation_config: Option<GeminiGenerationConfig>,
    /// Tool entries
    #[serde(default)]
    pub tools: Option<Vec<GeminiTool>>,
    /// Safety thresholds
    #[serde(default)]
    pub safety_settings: Option<Vec<SafetySetting>>,
    /// System instruction
    #[serde(default)]
    pub system_instruction: Option<GeminiContent>,
}

impl NativeGenerateRequest {
    /// Convert into the unified request for `model`
    ///
    /// # Errors
    /// Returns a validation error for unknown roles
    pub fn into_chat_request(self, model: &str, stream: bool) -> GatewayResult<ChatRequest> {
        let mut messages = Vec::with_capacity(self.contents.len());
        for content in self.contents {
            let role = match content.role.as_deref() {
                None | Some("user" | "function" | "tool") => Role::User,
                Some("model" | "assistant") => Role::Model,
                Some(other) => {
                    return Err(GatewayError::validation(
                        format!("unsupported content role: {other}"),
                        Some("contents".to_string()),
                    ));
                }
            };
            messages.push(Message::new(role, convert_parts(content.parts)));
        }

        let mut request = ChatRequest::new(model, messages, ClientProtocol::Native);
        request.stream = stream;
        request.system_instruction = self
            .system_instruction
            .map(|content| Message::new(Role::System, convert_parts(content.parts)))
            .filter(|message| !message.parts.is_empty());
        request.safety_settings = self.safety_settings;
        request.tools = convert_tools(self.tools.unwrap_or_default());

        if let Some(config) = self.generation_config {
            request.thinking = config.thinking_config.map(|t| ThinkingConfig {
                thinking_budget: t.thinking_budget,
                include_thoughts: t.include_thoughts,
            });
            request.generation.temperature = config.temperature;
            request.generation.top_p = config.top_p;
            request.generation.top_k = config.top_k;
            request.generation.max_output_tokens = config.max_output_tokens;
            request.generation.stop_sequences = config.stop_sequences;
            request.generation.response_mime_type = config.response_mime_type;
            request.generation.response_schema = config.response_schema;
        }

        Ok(request)
    }
}

fn convert_parts(parts: Vec<GeminiPart>) -> Vec<Part> {
    parts
        .into_iter()
        .filter_map(|part| {
            if let Some(text) = part.text {
                Some(Part::Text {
                    text,
                    thought: part.thought.unwrap_or(false),
                })
            } else if let Some(inline) = part.inline_data {
                Some(Part::InlineData {
                    mime_type: inline.mime_type,
                    data: inline.data,
                })
            } else if let Some(call) = part.function_call {
                Some(Part::FunctionCall {
                    name: call.name,
                    args: call.args,
                })
            } else if let Some(response) = part.function_response {
                Some(Part::FunctionResponse {
                    name: response.name,
                    response: response.response,
                })
            } else {
                debug!("Dropping part with no translatable content");
                None
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<GeminiTool>) -> DeclaredTools {
    let mut declared = DeclaredTools::default();
    for tool in tools {
        if let Some(functions) = tool.function_declarations {
            declared.functions.extend(functions);
        }
        if tool.google_search.is_some() {
            declared.builtins.push(BuiltinTool::GoogleSearch);
        }
        if tool.code_execution.is_some() {
            declared.builtins.push(BuiltinTool::CodeExecution);
        }
        declared.builtins.extend(
            tool.other
                .into_iter()
                .map(|(name, config)| BuiltinTool::Other { name, config }),
        );
    }
    declared
}

/// Render a result as a native response body
pub fn response_body(result: &CompletionResult) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    if let Some(reasoning) = &result.reasoning {
        parts.push(json!({"text": reasoning, "thought": true}));
    }
    if !result.text.is_empty() {
        parts.push(json!({"text": result.text}));
    }
    match &result.tool_calls {
        ToolCalls::Native(calls) => {
            parts.extend(calls.iter().map(|c| json!({"functionCall": {"name": c.name, "args": c.args}})));
        }
        ToolCalls::OpenAi(calls) => {
            parts.extend(calls.iter().map(|c| {
                let args: Value =
                    serde_json::from_str(&c.function.arguments).unwrap_or_else(|_| json!({}));
                json!({"functionCall": {"name": c.function.name, "args": args}})
            }));
        }
    }

    let mut candidate = json!({
        "content": {"role": "model", "parts": parts},
        "index": 0,
    });
    if let Some(reason) = result.finish_reason {
        candidate["finishReason"] = json!(reason.as_native());
    }

    let mut body = json!({ "candidates": [candidate] });
    if let Some(usage) = result.usage {
        body["usageMetadata"] = json!({
            "promptTokenCount": usage.prompt_tokens,
            "candidatesTokenCount": usage.completion_tokens,
            "thoughtsTokenCount": usage.reasoning_tokens,
            "totalTokenCount": usage.total_tokens,
        });
    }
    body
}

/// Render a model list
pub fn model_list(models: &[String]) -> Value {
    let models: Vec<Value> = models
        .iter()
        .map(|name| {
            json!({
                "name": format!("models/{name}"),
                "displayName": name,
                "supportedGenerationMethods": ["generateContent", "streamGenerateContent"],
            })
        })
        .collect();
    json!({ "models": models })
}

/// Render an error object
pub fn error_body(error: &GatewayError) -> Value {
    let cause = error.last_error();
    let status = match cause.status_code() {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        429 => "RESOURCE_EXHAUSTED",
        504 => "DEADLINE_EXCEEDED",
        502 | 503 => "UNAVAILABLE",
        _ => "INTERNAL",
    };
    json!({
        "error": {
            "code": cause.status_code(),
            "message": error.to_string(),
            "status": status,
        }
    })
}
