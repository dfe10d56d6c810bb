//! Build ToolCards from raw MCP `tools/list` entries.
//!
//! The input is the already-fetched listing JSON, not a live connection. MCP
//! servers vary wildly in how much routing metadata they publish, so missing
//! tags and synonyms are derived from the tool's own name and prose.

use serde_json::Value;

use super::card::{CostHint, SideEffect, ToolArg, ToolCard, ToolExample};
use crate::text;

impl ToolCard {
    /// Convert one raw MCP tool entry. Returns `None` when the entry has no
    /// usable name.
    pub fn from_mcp_tool(server_id: &str, tool: &Value) -> Option<ToolCard> {
        let tool = tool.as_object()?;
        let annotations = tool
            .get("annotations")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let lookup = |key: &str| tool.get(key).or_else(|| annotations.get(key));

        let tool_name = tool
            .get("name")
            .or_else(|| tool.get("toolName"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())?
            .to_string();

        let title = lookup("title").and_then(Value::as_str).map(str::to_string);
        let description = lookup("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut tags = string_list(lookup("tags"));
        let mut synonyms = string_list(lookup("synonyms"));
        tags.sort();
        synonyms.sort();
        if tags.is_empty() {
            tags = derive_tags(&tool_name, title.as_deref(), description.as_deref());
        }
        if synonyms.is_empty() {
            synonyms = derive_synonyms(&tool_name);
        }

        let schema = tool
            .get("inputSchema")
            .or_else(|| tool.get("input_schema"))
            .cloned()
            .unwrap_or(Value::Null);

        let side_effect = match lookup("sideEffect").and_then(Value::as_str) {
            Some("read") => SideEffect::Read,
            Some("write") => SideEffect::Write,
            Some("destructive") => SideEffect::Destructive,
            Some("none") => SideEffect::None,
            _ if truthy(lookup("destructiveHint")) => SideEffect::Destructive,
            _ if truthy(lookup("readOnlyHint")) => SideEffect::Read,
            _ => SideEffect::None,
        };

        let cost_hint = match lookup("costHint").and_then(Value::as_str) {
            Some("low") => Some(CostHint::Low),
            Some("medium") => Some(CostHint::Medium),
            Some("high") => Some(CostHint::High),
            _ => None,
        };

        Some(ToolCard {
            tool_id: format!("{server_id}:{tool_name}"),
            tool_name,
            server_id: server_id.to_string(),
            title,
            description,
            tags,
            synonyms,
            auth_hint: {
                let mut hints = string_list(lookup("authHint"));
                hints.sort();
                hints
            },
            args: args_from_schema(&schema),
            examples: examples_from_value(lookup("examples")),
            side_effect,
            open_world_hint: annotations.get("openWorldHint").and_then(Value::as_bool),
            idempotent_hint: annotations.get("idempotentHint").and_then(Value::as_bool),
            cost_hint,
            popularity: lookup("popularity").and_then(Value::as_f64),
        })
    }
}

fn truthy(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(value_to_text)
            .collect(),
        Some(other) => vec![value_to_text(other)],
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tags fall back to tokens of the name and title; thin results pull in the
/// description too.
fn derive_tags(tool_name: &str, title: Option<&str>, description: Option<&str>) -> Vec<String> {
    let mut tokens = text::tokenize(&format!("{} {}", tool_name, title.unwrap_or("")));
    if tokens.len() < 3 {
        tokens.extend(text::tokenize(description.unwrap_or("")));
    }
    tokens.sort();
    tokens.dedup();
    tokens
}

fn derive_synonyms(tool_name: &str) -> Vec<String> {
    let normalized = text::normalize(tool_name);
    if !normalized.is_empty() && normalized != tool_name.to_lowercase() {
        vec![normalized]
    } else {
        Vec::new()
    }
}

fn args_from_schema(schema: &Value) -> Vec<ToolArg> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut names: Vec<&String> = properties.keys().collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let prop = properties.get(name).and_then(Value::as_object);
            let get = |key: &str| prop.and_then(|p| p.get(key));
            ToolArg {
                name: name.clone(),
                description: get("description").and_then(Value::as_str).map(str::to_string),
                type_hint: prop.and_then(type_hint),
                required: required.contains(&name.as_str()).then_some(true),
                example: prop.and_then(example_value),
            }
        })
        .collect()
}

fn type_hint(prop: &serde_json::Map<String, Value>) -> Option<String> {
    match prop.get("type") {
        Some(Value::Array(types)) => Some(
            types
                .iter()
                .map(value_to_text)
                .collect::<Vec<_>>()
                .join("|"),
        ),
        Some(Value::String(t)) => match prop.get("format").and_then(Value::as_str) {
            Some(format) => Some(format!("{t}:{format}")),
            None => Some(t.clone()),
        },
        _ if prop.contains_key("anyOf") || prop.contains_key("oneOf") => Some("any".to_string()),
        _ => None,
    }
}

fn example_value(prop: &serde_json::Map<String, Value>) -> Option<String> {
    let value = prop
        .get("example")
        .or_else(|| prop.get("examples").and_then(Value::as_array)?.first())
        .or_else(|| prop.get("default"))?;
    Some(value_to_text(value))
}

fn examples_from_value(value: Option<&Value>) -> Vec<ToolExample> {
    let mut examples = Vec::new();
    match value {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Object(obj) => {
                        if let Some(query) = obj.get("query").and_then(Value::as_str) {
                            examples.push(ToolExample {
                                query: query.to_string(),
                                call_hint: obj
                                    .get("callHint")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                            });
                        }
                    }
                    Value::String(query) => examples.push(ToolExample {
                        query: query.clone(),
                        call_hint: None,
                    }),
                    _ => {}
                }
            }
        }
        Some(Value::Object(obj)) => {
            if let Some(query) = obj.get("query").and_then(Value::as_str) {
                examples.push(ToolExample {
                    query: query.to_string(),
                    call_hint: obj
                        .get("callHint")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            }
        }
        Some(Value::String(query)) => examples.push(ToolExample {
            query: query.clone(),
            call_hint: None,
        }),
        _ => {}
    }
    examples
}
