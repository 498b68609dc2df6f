//! OpenAI chat completions schema.
//!
//! Requests are converted into the unified [`ChatRequest`]; results are
//! rendered as `chat.completion` objects or `chat.completion.chunk` frames.

use gateway_core::{
    ChatRequest, ClientProtocol, CompletionResult, DeclaredTools, FunctionDeclaration,
    GatewayError, GatewayResult, Message, OpenAiToolCall, Part, Role, ToolCalls,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::google::translator::to_openai_call;

/// Sentinel frame closing an OpenAI stream
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Chat completion request
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChatRequest {
    /// Model name
    pub model: String,
    /// Conversation
    pub messages: Vec<OpenAiMessage>,
    /// Stream the response
    #[serde(default)]
    pub stream: bool,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Nucleus sampling
    #[serde(default)]
    pub top_p: Option<f32>,
    /// Top-k sampling
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Output token limit
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Output token limit (newer name)
    #[serde(default)]
    pub max_completion_tokens: Option<u32>,
    /// Number of choices; ignored, a single choice is returned
    #[serde(default)]
    pub n: Option<u32>,
    /// Stop sequences
    #[serde(default)]
    pub stop: Option<StopSequences>,
    /// Tools
    #[serde(default)]
    pub tools: Option<Vec<OpenAiTool>>,
    /// Output format
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
}

/// One message
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiMessage {
    /// `system`, `developer`, `user`, `assistant` or `tool`
    pub role: String,
    /// Content
    #[serde(default)]
    pub content: Option<OpenAiContent>,
    /// Tool calls made by the assistant
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /// Call answered by a `tool` message
    #[serde(default)]
    pub tool_call_id: Option<String>,
    /// Function name on legacy `tool` messages
    #[serde(default)]
    pub name: Option<String>,
}

/// Message content: a string or typed parts
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    /// Plain text
    Text(String),
    /// Typed parts
    Parts(Vec<OpenAiContentPart>),
}

impl OpenAiContent {
    fn joined_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    OpenAiContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Typed content part
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    /// Text
    Text {
        /// The text
        text: String,
    },
    /// Image reference
    ImageUrl {
        /// Image location
        image_url: ImageUrl,
    },
    /// Any part type this gateway does not translate
    #[serde(other)]
    Unsupported,
}

/// Image location
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrl {
    /// `data:` URL or remote URL
    pub url: String,
}

/// `stop` accepts one string or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    /// Single sequence
    One(String),
    /// Several sequences
    Many(Vec<String>),
}

/// Tool definition
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiTool {
    /// Tool type; only `function` is translated
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    #[serde(default)]
    pub function: Option<OpenAiFunctionDef>,
}

/// Function definition
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiFunctionDef {
    /// Name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// JSON schema of the parameters
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// Output format
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFormat {
    /// `text`, `json_object` or `json_schema`
    #[serde(rename = "type")]
    pub format_type: String,
    /// Schema wrapper for `json_schema`
    #[serde(default)]
    pub json_schema: Option<JsonSchemaFormat>,
}

/// `json_schema` response format
#[derive(Debug, Clone, Deserialize)]
pub struct JsonSchemaFormat {
    /// The schema
    #[serde(default)]
    pub schema: Option<Value>,
}

impl OpenAiChatRequest {
    /// Convert into the unified request
    ///
    /// # Errors
    /// Returns a validation error for unknown roles
    pub fn into_chat_request(self) -> GatewayResult<ChatRequest> {
        let mut system_parts: Vec<Part> = Vec::new();
        let mut messages: Vec<Message> = Vec::new();
        let mut call_names: HashMap<String, String> = HashMap::new();

        for message in self.messages {
            match message.role.as_str() {
                "system" | "developer" => {
                    if let Some(content) = &message.content {
                        system_parts.push(Part::text(content.joined_text()));
                    }
                }
                "user" => {
                    let parts = message.content.map(content_parts).unwrap_or_default();
                    push_turn(&mut messages, Role::User, parts);
                }
                "assistant" => {
                    let mut parts = Vec::new();
                    if let Some(content) = &message.content {
                        let text = content.joined_text();
                        if !text.is_empty() {
                            parts.push(Part::text(text));
                        }
                    }
                    for call in message.tool_calls.unwrap_or_default() {
                        call_names.insert(call.id.clone(), call.function.name.clone());
                        parts.push(Part::FunctionCall {
                            args: parse_arguments(&call.function.name, &call.function.arguments),
                            name: call.function.name,
                        });
                    }
                    push_turn(&mut messages, Role::Model, parts);
                }
                "tool" | "function" => {
                    let name = message
                        .tool_call_id
                        .as_ref()
                        .and_then(|id| call_names.get(id).cloned())
                        .or(message.name)
                        .unwrap_or_else(|| "unknown".to_string());
                    let text = message.content.map(|c| c.joined_text()).unwrap_or_default();
                    let response = match serde_json::from_str::<Value>(&text) {
                        Ok(object @ Value::Object(_)) => object,
                        _ => json!({ "content": text }),
                    };
                    push_turn(
                        &mut messages,
                        Role::User,
                        vec![Part::FunctionResponse { name, response }],
                    );
                }
                other => {
                    return Err(GatewayError::validation(
                        format!("unsupported message role: {other}"),
                        Some("messages".to_string()),
                    ));
                }
            }
        }

        let mut request = ChatRequest::new(self.model, messages, ClientProtocol::OpenAi);
        if !system_parts.is_empty() {
            request.system_instruction = Some(Message::new(Role::System, system_parts));
        }

        request.stream = self.stream;
        request.generation.temperature = self.temperature;
        request.generation.top_p = self.top_p;
        request.generation.top_k = self.top_k;
        request.generation.max_output_tokens = self.max_completion_tokens.or(self.max_tokens);
        request.generation.stop_sequences = match self.stop {
            Some(StopSequences::One(stop)) => vec![stop],
            Some(StopSequences::Many(stops)) => stops,
            None => Vec::new(),
        };

        if let Some(format) = self.response_format {
            match format.format_type.as_str() {
                "json_object" => {
                    request.generation.response_mime_type = Some("application/json".to_string());
                }
                "json_schema" => {
                    request.generation.response_mime_type = Some("application/json".to_string());
                    request.generation.response_schema = format.json_schema.and_then(|s| s.schema);
                }
                _ => {}
            }
        }

        request.tools = DeclaredTools {
            functions: self
                .tools
                .unwrap_or_default()
                .into_iter()
                .filter_map(|tool| {
                    if tool.tool_type != "function" {
                        debug!(tool_type = %tool.tool_type, "Ignoring non-function tool");
                        return None;
                    }
                    tool.function.map(|f| FunctionDeclaration {
                        name: f.name,
                        description: f.description,
                        parameters: f.parameters,
                    })
                })
                .collect(),
            builtins: Vec::new(),
        };

        Ok(request)
    }
}

/// Append parts, merging consecutive turns of the same role
fn push_turn(messages: &mut Vec<Message>, role: Role, parts: Vec<Part>) {
    if parts.is_empty() {
        return;
    }
    match messages.last_mut() {
        Some(last) if last.role == role => last.parts.extend(parts),
        _ => messages.push(Message::new(role, parts)),
    }
}

fn content_parts(content: OpenAiContent) -> Vec<Part> {
    match content {
        OpenAiContent::Text(text) => vec![Part::text(text)],
        OpenAiContent::Parts(parts) => parts
            .into_iter()
            .filter_map(|part| match part {
                OpenAiContentPart::Text { text } => Some(Part::text(text)),
                OpenAiContentPart::ImageUrl { image_url } => {
                    let parsed = parse_data_url(&image_url.url);
                    if parsed.is_none() {
                        warn!("Skipping image that is not a data URL");
                    }
                    parsed.map(|(mime_type, data)| Part::InlineData { mime_type, data })
                }
                OpenAiContentPart::Unsupported => {
                    debug!("Skipping unsupported content part");
                    None
                }
            })
            .collect(),
    }
}

/// Split `data:<mime>;base64,<data>`
pub fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    Some((mime_type.to_string(), data.to_string()))
}

fn parse_arguments(name: &str, arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            warn!(function = %name, "Tool call arguments are not a JSON object");
            json!({})
        }
    }
}

/// One model entry in `/v1/models`
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiModel {
    /// Model id
    pub id: String,
    /// Always `model`
    pub object: &'static str,
    /// Creation timestamp
    pub created: i64,
    /// Owner
    pub owned_by: &'static str,
}

/// Render a model list
pub fn model_list(models: &[String]) -> Value {
    let created = chrono::Utc::now().timestamp();
    let data: Vec<OpenAiModel> = models
        .iter()
        .map(|id| OpenAiModel {
            id: id.clone(),
            object: "model",
            created,
            owned_by: "google",
        })
        .collect();
    json!({ "object": "list", "data": data })
}

fn tool_calls(result: &CompletionResult) -> Vec<OpenAiToolCall> {
    match &result.tool_calls {
        ToolCalls::OpenAi(calls) => calls.clone(),
        ToolCalls::Native(calls) => calls.iter().map(to_openai_call).collect(),
    }
}

fn usage_body(result: &CompletionResult) -> Value {
    result.usage.map_or(Value::Null, |u| {
        json!({
            "prompt_tokens": u.prompt_tokens,
            "completion_tokens": u.completion_tokens,
            "total_tokens": u.total_tokens,
            "completion_tokens_details": {"reasoning_tokens": u.reasoning_tokens}
        })
    })
}

/// Render a unary `chat.completion`
pub fn completion_body(model: &str, result: &CompletionResult) -> Value {
    let calls = tool_calls(result);
    let content = if result.text.is_empty() && !calls.is_empty() {
        Value::Null
    } else {
        json!(result.text)
    };
    let mut message = json!({ "role": "assistant", "content": content });
    if let Some(reasoning) = &result.reasoning {
        message["reasoning_content"] = json!(reasoning);
    }
    if !calls.is_empty() {
        message["tool_calls"] = json!(calls);
    }

    json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": result.finish_reason.map(|r| r.as_str()),
        }],
        "usage": usage_body(result),
    })
}

/// Render one `chat.completion.chunk`
///
/// Tool-call indexes start at `first_tool_index`, the number of calls
/// already sent on this stream.
pub fn chunk_body(
    id: &str,
    model: &str,
    created: i64,
    first_tool_index: usize,
    result: &CompletionResult,
) -> Value {
    let mut delta = json!({ "role": "assistant" });
    if !result.text.is_empty() {
        delta["content"] = json!(result.text);
    }
    if let Some(reasoning) = &result.reasoning {
        delta["reasoning_content"] = json!(reasoning);
    }
    let calls = tool_calls(result);
    if !calls.is_empty() {
        let indexed: Vec<Value> = calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                json!({
                    "index": first_tool_index + index,
                    "id": call.id,
                    "type": call.call_type,
                    "function": {"name": call.function.name, "arguments": call.function.arguments},
                })
            })
            .collect();
        delta["tool_calls"] = json!(indexed);
    }

    let mut body = json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": result.finish_reason.map(|r| r.as_str()),
        }],
    });
    if result.usage.is_some() {
        body["usage"] = usage_body(result);
    }
    body
}

/// Render an error object
pub fn error_body(error: &GatewayError) -> Value {
    let cause = error.last_error();
    json!({
        "error": {
            "message": error.to_string(),
            "type": cause.error_type(),
            "code": cause.status_code(),
        }
    })
}
