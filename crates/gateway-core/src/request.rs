//! Request types for the gateway.
//!
//! This module defines the unified chat request that both client protocols
//! (OpenAI-style and native) are converted into before the backend payload is
//! built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Client-facing wire protocol that issued a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientProtocol {
    /// OpenAI chat completions schema
    #[default]
    OpenAi,
    /// Native `generateContent` schema
    Native,
}

impl ClientProtocol {
    /// Whether streams in this protocol end with an explicit sentinel frame
    #[must_use]
    pub fn has_end_sentinel(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

/// Author of a conversational turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user (also carries function responses)
    User,
    /// The model
    Model,
    /// System instructions
    System,
}

impl Role {
    /// Backend role string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::System => "system",
        }
    }
}

/// One part of a conversational turn. Order within a turn is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text, optionally flagged as model reasoning
    Text {
        /// The text
        text: String,
        /// Set when the backend marked the text as a thought
        #[serde(default)]
        thought: bool,
    },
    /// Inline binary data
    InlineData {
        /// MIME type of the payload
        mime_type: String,
        /// Base64-encoded bytes
        data: String,
    },
    /// A function invocation requested by the model
    FunctionCall {
        /// Function name
        name: String,
        /// Call arguments
        args: Value,
    },
    /// The result of a function invocation
    FunctionResponse {
        /// Function name
        name: String,
        /// Response payload
        response: Value,
    },
}

impl Part {
    /// Create a plain text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            thought: false,
        }
    }

    /// Whether this part carries a function call or response
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self, Self::FunctionCall { .. } | Self::FunctionResponse { .. })
    }
}

/// A conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the turn
    pub role: Role,
    /// Ordered parts
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a message
    #[must_use]
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Create a single-part text message
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::text(text)])
    }
}

/// Sampling and output controls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling
    pub top_p: Option<f32>,
    /// Top-k sampling
    pub top_k: Option<u32>,
    /// Output token limit
    pub max_output_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Forced output MIME type (e.g. `application/json`)
    pub response_mime_type: Option<String>,
    /// Output schema for structured responses
    pub response_schema: Option<Value>,
}

/// Caller-supplied reasoning controls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Token budget for reasoning
    pub thinking_budget: Option<i32>,
    /// Whether reasoning text should be returned
    pub include_thoughts: Option<bool>,
}

/// A callable function exposed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name
    pub name: String,
    /// Description shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Backend-provided tools that need no declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuiltinTool {
    /// Web search grounding
    GoogleSearch,
    /// Sandboxed code execution
    CodeExecution,
    /// Any other builtin, passed through by wire name
    Other {
        /// Wire name, e.g. `urlContext`
        name: String,
        /// Tool configuration object
        config: Value,
    },
}

/// Tools declared by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredTools {
    /// Function declarations, in declaration order
    #[serde(default)]
    pub functions: Vec<FunctionDeclaration>,
    /// Builtin tools requested explicitly
    #[serde(default)]
    pub builtins: Vec<BuiltinTool>,
}

impl DeclaredTools {
    /// Whether no tools were declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.builtins.is_empty()
    }
}

/// Explicit safety threshold for one harm category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    /// Harm category, e.g. `HARM_CATEGORY_HARASSMENT`
    pub category: String,
    /// Threshold, e.g. `BLOCK_NONE`
    pub threshold: String,
}

impl SafetySetting {
    /// Create a safety setting
    pub fn new(category: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            threshold: threshold.into(),
        }
    }
}

/// Unified chat request shared by both client protocols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Requested model, including any variant suffixes
    pub model: String,
    /// Conversation turns
    pub messages: Vec<Message>,
    /// System instruction
    #[serde(default)]
    pub system_instruction: Option<Message>,
    /// Sampling controls
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Declared tools
    #[serde(default)]
    pub tools: DeclaredTools,
    /// Explicit safety overrides
    #[serde(default)]
    pub safety_settings: Option<Vec<SafetySetting>>,
    /// Caller reasoning controls
    #[serde(default)]
    pub thinking: Option<ThinkingConfig>,
    /// Stream the response
    #[serde(default)]
    pub stream: bool,
    /// Protocol that issued the request
    #[serde(default)]
    pub protocol: ClientProtocol,
}

impl ChatRequest {
    /// Create a request with default options
    pub fn new(model: impl Into<String>, messages: Vec<Message>, protocol: ClientProtocol) -> Self {
        Self {
            model: model.into(),
            messages,
            system_instruction: None,
            generation: GenerationConfig::default(),
            tools: DeclaredTools::default(),
            safety_settings: None,
            thinking: None,
            stream: false,
            protocol,
        }
    }

    /// Whether any turn carries inline binary data
    #[must_use]
    pub fn has_inline_data(&self) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .any(|p| matches!(p, Part::InlineData { .. }))
    }

    /// Whether the conversation history contains a function call or response
    #[must_use]
    pub fn has_function_history(&self) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .any(Part::is_function)
    }

    /// Whether the caller forces JSON output
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.generation
            .response_mime_type
            .as_deref()
            .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json"))
    }

    /// Validate the request
    ///
    /// # Errors
    /// Returns error if any field is invalid
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.model.trim().is_empty() {
            return Err(GatewayError::validation(
                "model is required",
                Some("model".to_string()),
            ));
        }

        if self.messages.is_empty() {
            return Err(GatewayError::validation(
                "messages cannot be empty",
                Some("messages".to_string()),
            ));
        }

        if let Some(t) = self.generation.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GatewayError::validation(
                    format!("temperature must be between 0.0 and 2.0, got {t}"),
                    Some("temperature".to_string()),
                ));
            }
        }

        if let Some(p) = self.generation.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GatewayError::validation(
                    format!("top_p must be between 0.0 and 1.0, got {p}"),
                    Some("top_p".to_string()),
                ));
            }
        }

        Ok(())
    }
}
