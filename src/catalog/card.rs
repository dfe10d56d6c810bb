//! ToolCard: the catalog's structured description of a tool.

use serde::{Deserialize, Serialize};

use super::CatalogError;

/// Side-effect class advertised by a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffect {
    #[default]
    None,
    Read,
    Write,
    Destructive,
}

impl SideEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffect::None => "none",
            SideEffect::Read => "read",
            SideEffect::Write => "write",
            SideEffect::Destructive => "destructive",
        }
    }
}

/// Advisory cost class for invoking a tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostHint {
    Low,
    Medium,
    High,
}

impl CostHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostHint::Low => "low",
            CostHint::Medium => "medium",
            CostHint::High => "high",
        }
    }
}

/// One argument of a tool, as described by its input schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolArg {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// A sample query that should route to this tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExample {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_hint: Option<String>,
}

/// Catalog entry for one tool, keyed by `{serverId}:{toolName}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCard {
    pub tool_id: String,
    pub tool_name: String,
    pub server_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auth_hint: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ToolArg>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ToolExample>,
    #[serde(default)]
    pub side_effect: SideEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_hint: Option<CostHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
}

impl ToolCard {
    /// Minimal card with the three required identity fields.
    pub fn new(
        server_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        let server_id = server_id.into();
        let tool_name = tool_name.into();
        Self {
            tool_id: format!("{server_id}:{tool_name}"),
            tool_name,
            server_id,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = Some(popularity);
        self
    }

    /// Validate the identity fields a card cannot function without.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.tool_id.is_empty() {
            return Err(CatalogError::InvalidCard {
                reason: "toolId is required".into(),
            });
        }
        if self.tool_name.is_empty() {
            return Err(CatalogError::InvalidCard {
                reason: format!("tool '{}' is missing toolName", self.tool_id),
            });
        }
        if self.server_id.is_empty() {
            return Err(CatalogError::InvalidCard {
                reason: format!("tool '{}' is missing serverId", self.tool_id),
            });
        }
        Ok(())
    }
}

/// Split a toolId into `(serverId, toolName)`.
pub fn split_tool_id(tool_id: &str) -> Option<(&str, &str)> {
    let (server, tool) = tool_id.split_once(':')?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_builder_derives_tool_id() {
        let card = ToolCard::new("slack", "post_message");
        assert_eq!(card.tool_id, "slack:post_message");
        assert_eq!(card.server_id, "slack");
        assert_eq!(card.tool_name, "post_message");
        assert!(card.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_tool_id() {
        let card = ToolCard {
            tool_name: "x".into(),
            server_id: "s".into(),
            ..ToolCard::default()
        };
        assert!(card.validate().is_err());
    }

    #[test]
    fn test_split_tool_id() {
        assert_eq!(
            split_tool_id("slack:post_message"),
            Some(("slack", "post_message"))
        );
        assert_eq!(split_tool_id("noseparator"), None);
        assert_eq!(split_tool_id(":tool"), None);
        assert_eq!(split_tool_id("server:"), None);
    }

    #[test]
    fn test_card_serde_camel_case() {
        let card = ToolCard::new("fs", "read_file").with_title("Read file");
        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"toolId\":\"fs:read_file\""));
        assert!(json.contains("\"toolName\""));
        assert!(json.contains("\"serverId\""));
        // defaulted optionals stay off the wire
        assert!(!json.contains("popularity"));
    }

    #[test]
    fn test_side_effect_default_and_serde() {
        assert_eq!(SideEffect::default(), SideEffect::None);
        let parsed: SideEffect = serde_json::from_str("\"destructive\"").unwrap();
        assert_eq!(parsed, SideEffect::Destructive);
        assert_eq!(serde_json::to_string(&SideEffect::Read).unwrap(), "\"read\"");
    }
}
