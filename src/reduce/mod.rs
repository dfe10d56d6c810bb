//! Deterministic reduction of tool-call results to byte-capped
//! text-and-structured pairs.

pub mod stable;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use stable::to_stable_string;

const TRUNCATED: &str = "[Truncated]";

pub const DEFAULT_MAX_TEXT_BYTES: u64 = 12_000;
pub const DEFAULT_MAX_STRUCTURED_BYTES: u64 = 24_000;
pub const DEFAULT_MAX_STRUCTURED_KEYS: usize = 200;
pub const DEFAULT_MAX_STRUCTURED_ITEMS: usize = 200;
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Byte and shape budgets for one reduction. Each field can be overridden
/// per call; unspecified fields keep their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReducePolicy {
    pub max_text_bytes: u64,
    pub max_structured_bytes: u64,
    pub max_structured_keys: usize,
    pub max_structured_items: usize,
    pub max_depth: usize,
}

impl Default for ReducePolicy {
    fn default() -> Self {
        Self {
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
            max_structured_bytes: DEFAULT_MAX_STRUCTURED_BYTES,
            max_structured_keys: DEFAULT_MAX_STRUCTURED_KEYS,
            max_structured_items: DEFAULT_MAX_STRUCTURED_ITEMS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReducedToolResult {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    pub dropped_bytes: u64,
    pub dropped_tokens_estimate: u64,
    pub notes: Vec<String>,
}

/// Reduce an arbitrary tool result. Stateless; `tool_id` is only used for
/// diagnostics.
pub fn reduce(tool_id: Option<&str>, raw: &Value, policy: &ReducePolicy) -> ReducedToolResult {
    let mut notes: Vec<String> = Vec::new();
    let mut dropped_bytes: u64 = 0;

    let (mut text, structured) = normalize(raw, &mut notes);

    if raw.get("isError").and_then(Value::as_bool) == Some(true) {
        text = if text.is_empty() {
            "[error]".to_string()
        } else {
            format!("[error] {text}")
        };
        notes.push("is_error".to_string());
    }

    let structured = structured.and_then(|value| {
        let size_before = stable::stable_byte_len(&value);
        let trimmed = trim_value(&value, 0, policy);
        let size_after = stable::stable_byte_len(&trimmed);

        if size_after > policy.max_structured_bytes {
            notes.push("structured_dropped".to_string());
            dropped_bytes += size_before;
            None
        } else {
            if size_after < size_before {
                notes.push("structured_trimmed".to_string());
                dropped_bytes += size_before - size_after;
            }
            Some(trimmed)
        }
    });

    let text_bytes = text.len() as u64;
    if text_bytes > policy.max_text_bytes {
        text = truncate_utf8(&text, policy.max_text_bytes);
        dropped_bytes += text_bytes - text.len() as u64;
        notes.push("text_truncated".to_string());
    }

    if dropped_bytes > 0 {
        tracing::debug!(tool_id, dropped_bytes, "reduced tool result");
    }

    ReducedToolResult {
        text,
        structured,
        dropped_tokens_estimate: dropped_bytes.div_ceil(4),
        dropped_bytes,
        notes,
    }
}

/// Resolve the raw result into a text/structured pair.
fn normalize(raw: &Value, notes: &mut Vec<String>) -> (String, Option<Value>) {
    match raw {
        Value::Null => (String::new(), None),
        Value::String(s) => {
            let trimmed = s.trim_start();
            let structured = (trimmed.starts_with('{') || trimmed.starts_with('['))
                .then(|| serde_json::from_str::<Value>(s).ok())
                .flatten()
                .filter(|parsed| parsed.is_object() || parsed.is_array());
            if structured.is_some() {
                notes.push("parsed_json".to_string());
            }
            (s.clone(), structured)
        }
        Value::Object(obj) => {
            // only object-typed structured fields are preferred; arrays and
            // other values fall through to the whole input object
            let preferred = obj
                .get("structured")
                .or_else(|| obj.get("structuredContent"))
                .filter(|v| v.is_object())
                .cloned();
            if preferred.is_some() {
                notes.push("structured_preferred".to_string());
            }

            let text = match obj.get("text").and_then(Value::as_str) {
                Some(text) => Some(text.to_string()),
                None => obj.get("content").and_then(Value::as_array).map(|items| {
                    items
                        .iter()
                        .filter_map(|item| match item {
                            Value::String(s) => Some(s.as_str()),
                            Value::Object(o) => o.get("text").and_then(Value::as_str),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }),
            };

            let structured = preferred.unwrap_or_else(|| raw.clone());
            let text = text.unwrap_or_else(|| stable::to_stable_string(raw));
            (text, Some(structured))
        }
        Value::Array(_) => (stable::to_stable_string(raw), Some(raw.clone())),
        Value::Bool(b) => (b.to_string(), None),
        Value::Number(n) => (n.to_string(), None),
    }
}

/// Depth-bounded structural trim: arrays keep the first `max_structured_items`
/// elements, objects the first `max_structured_keys` keys in lexicographic
/// order. Containers at the depth limit collapse to the sentinel.
fn trim_value(value: &Value, depth: usize, policy: &ReducePolicy) -> Value {
    match value {
        Value::Array(items) => {
            if depth >= policy.max_depth {
                return Value::String(TRUNCATED.to_string());
            }
            Value::Array(
                items
                    .iter()
                    .take(policy.max_structured_items)
                    .map(|item| trim_value(item, depth + 1, policy))
                    .collect(),
            )
        }
        Value::Object(map) => {
            if depth >= policy.max_depth {
                return Value::String(TRUNCATED.to_string());
            }
            // serde_json's map iterates in key order already
            Value::Object(
                map.iter()
                    .take(policy.max_structured_keys)
                    .map(|(key, item)| (key.clone(), trim_value(item, depth + 1, policy)))
                    .collect(),
            )
        }
        primitive => primitive.clone(),
    }
}

/// Longest character prefix whose UTF-8 encoding fits in `max_bytes`, found
/// by binary search over code-point counts so a multi-byte sequence is never
/// split.
fn truncate_utf8(text: &str, max_bytes: u64) -> String {
    let max_bytes = max_bytes as usize;
    if text.len() <= max_bytes {
        return text.to_string();
    }

    // byte offset of each code point, plus the end sentinel
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain([text.len()])
        .collect();

    // offsets is sorted, so partition_point finds the largest prefix length
    // (in code points) still within budget
    let fitting = offsets.partition_point(|offset| *offset <= max_bytes);
    let end = offsets[fitting.saturating_sub(1)];
    text[..end].to_string()
}
