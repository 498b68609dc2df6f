//! # Gateway Providers
//!
//! Backend integration for the Gemini relay gateway.
//!
//! This crate provides:
//! - Gemini wire types and the HTTP client for `generateContent`
//! - The protocol translator between the unified model and the backend
//! - OpenAI-style and native client schemas
//! - The stream relay with adaptive output pacing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod google;
pub mod native;
pub mod openai;
pub mod relay;
pub mod upload;

// Re-export main types
pub use google::{
    BackendPayload, GeminiClient, GeminiClientConfig, ModelVariant, ProtocolTranslator,
    StaticModelCatalog, TranslatorConfig,
};
pub use native::NativeGenerateRequest;
pub use openai::OpenAiChatRequest;
pub use relay::{Framer, PacingConfig, StreamOptimizer, StreamRelay};
pub use upload::DataUrlUploadSink;
