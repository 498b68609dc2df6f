//! # Gateway Core
//!
//! Core types, traits, and error handling for the Gemini relay gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The unified chat request both client protocols convert into
//! - Protocol-neutral completion results and stream chunks
//! - The error taxonomy driving retry decisions
//! - Interfaces to collaborators (attempt logging, uploads, model catalog)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collaborators;
pub mod error;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use collaborators::{
    AttemptRecord, AttemptSink, ErrorRecord, ModelCatalog, NoopAttemptSink, UploadSink,
};
pub use error::{GatewayError, GatewayResult};
pub use request::{
    BuiltinTool, ChatRequest, ClientProtocol, DeclaredTools, FunctionDeclaration,
    GenerationConfig, Message, Part, Role, SafetySetting, ThinkingConfig,
};
pub use response::{
    ChunkKind, CompletionResult, FinishReason, NativeFunctionCall, OpenAiFunction,
    OpenAiToolCall, StreamChunk, ToolCalls, Usage,
};
