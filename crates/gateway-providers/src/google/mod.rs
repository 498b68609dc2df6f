//! Gemini backend: wire types, protocol translation and HTTP client.
//!
//! Requests flow through [`ProtocolTranslator::build_payload`] into a
//! [`BackendPayload`], are sent by [`GeminiClient`], and come back through
//! [`ProtocolTranslator::parse_response`] as protocol-neutral results.

pub mod client;
pub mod model;
pub mod payload;
pub mod safety;
pub mod tools;
pub mod translator;
pub mod wire;

pub use client::{GeminiClient, GeminiClientConfig, API_KEY_HEADER};
pub use model::{ModelVariant, StaticModelCatalog};
pub use payload::BackendPayload;
pub use translator::{ProtocolTranslator, TranslatorConfig, NO_CONTENT_PLACEHOLDER};
pub use wire::{GeminiErrorBody, GeminiResponse};
