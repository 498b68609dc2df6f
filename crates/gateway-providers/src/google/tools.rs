//! Tool list construction.
//!
//! Function declarations and the backend builtins (search grounding, code
//! execution) cannot be combined in one request: whenever function calling is
//! in play, the builtins are removed.

use gateway_core::{BuiltinTool, ChatRequest, FunctionDeclaration};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::model::ModelVariant;
use super::wire::GeminiTool;

/// JSON-schema keywords the backend rejects in function parameters
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "additionalProperties",
    "exclusiveMinimum",
    "exclusiveMaximum",
];

/// Build the backend tool list for a request
pub fn build_tools(
    request: &ChatRequest,
    variant: &ModelVariant,
    code_execution_enabled: bool,
) -> Vec<GeminiTool> {
    let functions = merge_declarations(&request.tools.functions);
    let function_calling = !functions.is_empty() || request.has_function_history();

    let mut builtins: Vec<BuiltinTool> = Vec::new();
    if request.wants_json() {
        if !request.tools.builtins.is_empty() {
            debug!(model = %variant.requested, "Dropping builtin tools for JSON output");
        }
    } else {
        for tool in &request.tools.builtins {
            push_unique(&mut builtins, tool.clone());
        }

        if code_execution_enabled
            && !variant.requested.contains("-search")
            && !variant.mentions_thinking()
            && !request.has_inline_data()
        {
            push_unique(&mut builtins, BuiltinTool::CodeExecution);
        }

        if variant.is_search {
            push_unique(&mut builtins, BuiltinTool::GoogleSearch);
        }
    }

    if function_calling {
        builtins.retain(|tool| {
            !matches!(tool, BuiltinTool::GoogleSearch | BuiltinTool::CodeExecution)
        });
    }

    let mut tools = Vec::with_capacity(builtins.len() + 1);
    if !functions.is_empty() {
        tools.push(GeminiTool {
            function_declarations: Some(functions),
            ..GeminiTool::default()
        });
    }
    tools.extend(builtins.into_iter().map(builtin_entry));
    tools
}

/// Deduplicate declarations by name, keeping first-seen order
///
/// A later declaration with the same name fills or overrides the fields of
/// the earlier one; parameter objects are merged key by key.
pub fn merge_declarations(declarations: &[FunctionDeclaration]) -> Vec<FunctionDeclaration> {
    let mut merged: Vec<FunctionDeclaration> = Vec::with_capacity(declarations.len());

    for declaration in declarations {
        let parameters = declaration.parameters.clone().map(sanitize_schema);

        if let Some(existing) = merged.iter_mut().find(|d| d.name == declaration.name) {
            if declaration.description.is_some() {
                existing.description.clone_from(&declaration.description);
            }
            existing.parameters = match (existing.parameters.take(), parameters) {
                (Some(Value::Object(mut base)), Some(Value::Object(update))) => {
                    base.extend(update);
                    Some(Value::Object(base))
                }
                (base, update) => update.or(base),
            };
        } else {
            merged.push(FunctionDeclaration {
                name: declaration.name.clone(),
                description: declaration.description.clone(),
                parameters,
            });
        }
    }

    merged
}

/// Strip schema keywords the backend rejects, recursively
pub fn sanitize_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key, sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_schema).collect()),
        other => other,
    }
}

fn push_unique(tools: &mut Vec<BuiltinTool>, tool: BuiltinTool) {
    if !tools.contains(&tool) {
        tools.push(tool);
    }
}

fn builtin_entry(tool: BuiltinTool) -> GeminiTool {
    match tool {
        BuiltinTool::GoogleSearch => GeminiTool {
            google_search: Some(json!({})),
            ..GeminiTool::default()
        },
        BuiltinTool::CodeExecution => GeminiTool {
            code_execution: Some(json!({})),
            ..GeminiTool::default()
        },
        BuiltinTool::Other { name, config } => {
            let mut other = Map::new();
            other.insert(name, config);
            GeminiTool {
                other,
                ..GeminiTool::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{ClientProtocol, Message, Part, Role};

    fn request(model: &str) -> ChatRequest {
        ChatRequest::new(model, vec![Message::text(Role::User, "hi")], ClientProtocol::OpenAi)
    }

    fn declaration(name: &str) -> FunctionDeclaration {
        FunctionDeclaration {
            name: name.into(),
            description: None,
            parameters: Some(json!({"type": "object", "properties": {}})),
        }
    }

    fn kinds(tools: &[GeminiTool]) -> (bool, bool, bool) {
        (
            tools.iter().any(|t| t.function_declarations.is_some()),
            tools.iter().any(|t| t.google_search.is_some()),
            tools.iter().any(|t| t.code_execution.is_some()),
        )
    }

    #[test]
    fn test_search_variant_gets_search_only() {
        let req = request("gemini-2.0-flash-search");
        let tools = build_tools(&req, &ModelVariant::parse(&req.model), true);
        assert_eq!(kinds(&tools), (false, true, false));
    }

    #[test]
    fn test_code_execution_injected_when_enabled() {
        let req = request("gemini-2.0-flash");
        let variant = ModelVariant::parse(&req.model);
        assert_eq!(kinds(&build_tools(&req, &variant, true)), (false, false, true));
        assert!(build_tools(&req, &variant, false).is_empty());
    }

    #[test]
    fn test_code_execution_skipped_for_thinking_and_inline_data() {
        let req = request("gemini-2.0-flash-thinking-exp");
        assert!(build_tools(&req, &ModelVariant::parse(&req.model), true).is_empty());

        let mut req = request("gemini-2.0-flash");
        req.messages.push(Message::new(
            Role::User,
            vec![Part::InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            }],
        ));
        assert!(build_tools(&req, &ModelVariant::parse(&req.model), true).is_empty());
    }

    #[test]
    fn test_functions_remove_builtins() {
        let mut req = request("gemini-2.0-flash-search");
        req.tools.functions.push(declaration("lookup"));
        req.tools.builtins.push(BuiltinTool::CodeExecution);

        let tools = build_tools(&req, &ModelVariant::parse(&req.model), true);
        assert_eq!(kinds(&tools), (true, false, false));
    }

    #[test]
    fn test_function_history_removes_builtins() {
        let mut req = request("gemini-2.0-flash-search");
        req.messages.push(Message::new(
            Role::Model,
            vec![Part::FunctionCall {
                name: "lookup".into(),
                args: json!({}),
            }],
        ));

        let tools = build_tools(&req, &ModelVariant::parse(&req.model), true);
        assert!(tools.is_empty());
    }

    #[test]
    fn test_json_output_drops_builtins() {
        let mut req = request("gemini-2.0-flash-search");
        req.generation.response_mime_type = Some("application/json".into());
        req.tools.builtins.push(BuiltinTool::Other {
            name: "urlContext".into(),
            config: json!({}),
        });

        assert!(build_tools(&req, &ModelVariant::parse(&req.model), true).is_empty());
    }

    #[test]
    fn test_other_builtins_survive_function_calling() {
        let mut req = request("gemini-2.0-flash");
        req.tools.functions.push(declaration("lookup"));
        req.tools.builtins.push(BuiltinTool::Other {
            name: "urlContext".into(),
            config: json!({}),
        });

        let tools = build_tools(&req, &ModelVariant::parse(&req.model), false);
        assert_eq!(tools.len(), 2);
        assert!(tools[1].other.contains_key("urlContext"));
    }

    #[test]
    fn test_merge_declarations_by_name() {
        let first = FunctionDeclaration {
            name: "lookup".into(),
            description: Some("old".into()),
            parameters: Some(json!({"type": "object"})),
        };
        let second = FunctionDeclaration {
            name: "lookup".into(),
            description: None,
            parameters: Some(json!({"properties": {"q": {"type": "string"}}})),
        };

        let merged = merge_declarations(&[first, declaration("other"), second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "lookup");
        assert_eq!(merged[0].description.as_deref(), Some("old"));
        assert_eq!(
            merged[0].parameters,
            Some(json!({"type": "object", "properties": {"q": {"type": "string"}}}))
        );
        assert_eq!(merged[1].name, "other");
    }

    #[test]
    fn test_sanitize_schema_recurses() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "properties": {"items": {"type": "array", "items": [{"additionalProperties": true, "type": "string"}]}}
        });

        assert_eq!(
            sanitize_schema(schema),
            json!({
                "type": "object",
                "properties": {"items": {"type": "array", "items": [{"type": "string"}]}}
            })
        );
    }
}
