//! Response types for the gateway.
//!
//! A [`CompletionResult`] is the protocol-neutral outcome of one backend
//! response (or one streamed fragment of it). Client schemas render it into
//! their own wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of output
    Stop,
    /// Output token limit reached
    Length,
    /// Model requested tool invocations
    ToolCalls,
    /// Output blocked by a content filter
    ContentFilter,
}

impl FinishReason {
    /// OpenAI-style string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
        }
    }

    /// Native (backend) string
    #[must_use]
    pub fn as_native(self) -> &'static str {
        match self {
            Self::Stop | Self::ToolCalls => "STOP",
            Self::Length => "MAX_TOKENS",
            Self::ContentFilter => "SAFETY",
        }
    }
}

/// Token accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Generated tokens
    pub completion_tokens: u32,
    /// Reasoning tokens, when reported
    pub reasoning_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Function call in backend-native shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeFunctionCall {
    /// Function name
    pub name: String,
    /// Arguments object
    pub args: Value,
}

/// Function call in OpenAI `tool_calls` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    /// Call identifier (`call_<uuid>`)
    pub id: String,
    /// Always `function`
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function payload
    pub function: OpenAiFunction,
}

/// OpenAI function payload with stringified arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiFunction {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Tool calls, shaped for the protocol that issued the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "calls", rename_all = "snake_case")]
pub enum ToolCalls {
    /// Backend-native pass-through
    Native(Vec<NativeFunctionCall>),
    /// Synthesized OpenAI `tool_calls`
    OpenAi(Vec<OpenAiToolCall>),
}

impl Default for ToolCalls {
    fn default() -> Self {
        Self::Native(Vec::new())
    }
}

impl ToolCalls {
    /// Number of calls
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Native(calls) => calls.len(),
            Self::OpenAi(calls) => calls.len(),
        }
    }

    /// Whether there are no calls
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Protocol-neutral completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Answer text
    pub text: String,
    /// Reasoning text, only when surfacing is enabled
    pub reasoning: Option<String>,
    /// Tool calls
    pub tool_calls: ToolCalls,
    /// Finish reason reported by the backend
    pub finish_reason: Option<FinishReason>,
    /// Token usage
    pub usage: Option<Usage>,
}

impl CompletionResult {
    /// Completion with only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Whether this result carries anything other than plain text
    #[must_use]
    pub fn is_text_only(&self) -> bool {
        self.tool_calls.is_empty() && self.reasoning.is_none()
    }

    /// Whether there is nothing to emit
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.reasoning.is_none() && self.tool_calls.is_empty()
    }
}

/// Kind of streamed fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Incremental content
    Content,
    /// Synthetic end-of-stream chunk carrying the finish reason
    Terminal,
}

/// One streamed fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Fragment content
    pub result: CompletionResult,
    /// Content or terminal
    pub kind: ChunkKind,
}

impl StreamChunk {
    /// Content chunk
    #[must_use]
    pub fn content(result: CompletionResult) -> Self {
        Self {
            result,
            kind: ChunkKind::Content,
        }
    }

    /// Terminal chunk
    #[must_use]
    pub fn terminal(finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            result: CompletionResult {
                finish_reason: Some(finish_reason),
                usage,
                ..CompletionResult::default()
            },
            kind: ChunkKind::Terminal,
        }
    }

    /// Whether this is the terminal chunk
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind == ChunkKind::Terminal
    }
}
