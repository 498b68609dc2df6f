//! Backend request construction.

use gateway_core::{ChatRequest, Message, Part, Role};

use super::model::ModelVariant;
use super::safety;
use super::tools::{build_tools, sanitize_schema};
use super::translator::TranslatorConfig;
use super::wire::{
    GeminiContent, GeminiFunctionCall, GeminiFunctionResponse, GeminiGenerationConfig,
    GeminiInlineData, GeminiPart, GeminiRequest, GeminiThinkingConfig,
};

/// Minimum reasoning budget accepted by `pro` models
pub const PRO_MIN_THINKING_BUDGET: i32 = 128;

/// Backend-ready request plus the decoded model variant
#[derive(Debug, Clone, PartialEq)]
pub struct BackendPayload {
    /// Decoded model name
    pub variant: ModelVariant,
    /// Request body
    pub body: GeminiRequest,
}

impl BackendPayload {
    /// Backend model id, variant suffixes removed
    #[must_use]
    pub fn model(&self) -> &str {
        &self.variant.real
    }
}

/// Project a unified request onto the backend schema
pub fn build_payload(config: &TranslatorConfig, model: &str, request: &ChatRequest) -> BackendPayload {
    let variant = ModelVariant::parse(model);

    let mut system_parts: Vec<GeminiPart> = request
        .system_instruction
        .iter()
        .flat_map(|m| m.parts.iter())
        .map(to_part)
        .collect();
    let mut contents = Vec::with_capacity(request.messages.len());
    for message in &request.messages {
        if message.role == Role::System {
            system_parts.extend(message.parts.iter().map(to_part));
        } else {
            contents.push(to_content(message));
        }
    }

    let system_instruction = if variant.is_image || system_parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: system_parts,
        })
    };

    let body = GeminiRequest {
        contents,
        system_instruction,
        generation_config: generation_config(config, &variant, request),
        tools: build_tools(request, &variant, config.code_execution),
        safety_settings: safety::resolve(&variant.real, request.safety_settings.as_deref()),
    };

    BackendPayload { variant, body }
}

/// Convert one turn
pub fn to_content(message: &Message) -> GeminiContent {
    GeminiContent {
        role: Some(message.role.as_str().to_string()),
        parts: message.parts.iter().map(to_part).collect(),
    }
}

/// Convert one part
pub fn to_part(part: &Part) -> GeminiPart {
    match part {
        Part::Text { text, thought } => GeminiPart {
            text: Some(text.clone()),
            thought: thought.then_some(true),
            ..GeminiPart::default()
        },
        Part::InlineData { mime_type, data } => GeminiPart {
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
            ..GeminiPart::default()
        },
        Part::FunctionCall { name, args } => GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: name.clone(),
                args: args.clone(),
            }),
            ..GeminiPart::default()
        },
        Part::FunctionResponse { name, response } => GeminiPart {
            function_response: Some(GeminiFunctionResponse {
                name: name.clone(),
                response: response.clone(),
            }),
            ..GeminiPart::default()
        },
    }
}

fn generation_config(
    config: &TranslatorConfig,
    variant: &ModelVariant,
    request: &ChatRequest,
) -> Option<GeminiGenerationConfig> {
    let generation = &request.generation;
    let built = GeminiGenerationConfig {
        temperature: generation.temperature,
        top_p: generation.top_p,
        top_k: generation.top_k,
        max_output_tokens: generation.max_output_tokens,
        stop_sequences: generation.stop_sequences.clone(),
        response_mime_type: generation.response_mime_type.clone(),
        response_schema: generation.response_schema.clone().map(sanitize_schema),
        candidate_count: None,
        response_modalities: variant
            .is_image
            .then(|| vec!["TEXT".to_string(), "IMAGE".to_string()]),
        thinking_config: thinking_config(config, variant, request),
    };

    (built != GeminiGenerationConfig::default()).then_some(built)
}

fn thinking_config(
    config: &TranslatorConfig,
    variant: &ModelVariant,
    request: &ChatRequest,
) -> Option<GeminiThinkingConfig> {
    if let Some(caller) = &request.thinking {
        return Some(GeminiThinkingConfig {
            thinking_budget: caller.thinking_budget,
            include_thoughts: caller.include_thoughts,
        });
    }

    if variant.is_non_thinking {
        let budget = if variant.is_pro() { PRO_MIN_THINKING_BUDGET } else { 0 };
        return Some(GeminiThinkingConfig {
            thinking_budget: Some(budget),
            include_thoughts: None,
        });
    }

    if config.thinking_models.iter().any(|m| *m == variant.real) {
        return Some(GeminiThinkingConfig {
            thinking_budget: config.thinking_budgets.get(&variant.real).copied(),
            include_thoughts: Some(config.show_thinking),
        });
    }

    None
}
