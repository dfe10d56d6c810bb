//! Token-cost estimation for catalog tools.

use crate::catalog::ToolCard;

/// Floor applied to every known-tool estimate.
pub const MIN_TOOL_COST: u64 = 8;

/// Flat overhead modeling serialization framing around a tool definition.
const SERIALIZATION_OVERHEAD: u64 = 12;

/// Estimate the tokens a tool definition costs when surfaced to a model:
/// roughly one token per four UTF-8 bytes of its flattened card text, plus
/// framing overhead.
pub fn estimate_tool_tokens(card: &ToolCard) -> u64 {
    let mut parts: Vec<&str> = vec![&card.tool_id, &card.tool_name];
    if let Some(title) = &card.title {
        parts.push(title);
    }
    if let Some(description) = &card.description {
        parts.push(description);
    }
    parts.extend(card.tags.iter().map(String::as_str));
    parts.extend(card.synonyms.iter().map(String::as_str));
    for arg in &card.args {
        parts.push(&arg.name);
        if let Some(description) = &arg.description {
            parts.push(description);
        }
        if let Some(type_hint) = &arg.type_hint {
            parts.push(type_hint);
        }
        if let Some(example) = &arg.example {
            parts.push(example);
        }
    }
    for example in &card.examples {
        parts.push(&example.query);
        if let Some(hint) = &example.call_hint {
            parts.push(hint);
        }
    }
    parts.extend(card.auth_hint.iter().map(String::as_str));
    parts.push(card.side_effect.as_str());
    if let Some(cost_hint) = &card.cost_hint {
        parts.push(cost_hint.as_str());
    }

    let bytes = parts.join(" ").len() as u64;
    let estimate = bytes.div_ceil(4);
    (estimate + SERIALIZATION_OVERHEAD).max(MIN_TOOL_COST)
}
