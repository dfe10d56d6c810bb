//! Search document derived from a ToolCard at upsert time.

use serde::{Deserialize, Serialize};

use super::card::ToolCard;

/// The nine textual fields a tool is indexed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchField {
    Name,
    Title,
    Description,
    Tags,
    Synonyms,
    ArgNames,
    ArgDescs,
    Examples,
    ServerId,
}

impl SearchField {
    pub const ALL: [SearchField; 9] = [
        SearchField::Name,
        SearchField::Title,
        SearchField::Description,
        SearchField::Tags,
        SearchField::Synonyms,
        SearchField::ArgNames,
        SearchField::ArgDescs,
        SearchField::Examples,
        SearchField::ServerId,
    ];

    /// Stable index into per-field arrays.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

/// Flattened textual view of a ToolCard, one string per indexed field.
///
/// Deriving this is a pure function of the card; the catalog regenerates it
/// on every upsert so `tools` and `docs` can never drift apart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSearchDoc {
    pub tool_id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub tags: String,
    pub synonyms: String,
    pub arg_names: String,
    pub arg_descs: String,
    pub examples: String,
    pub server_id: String,
}

impl ToolSearchDoc {
    pub fn from_card(card: &ToolCard) -> Self {
        let arg_names = card
            .args
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let arg_descs = card
            .args
            .iter()
            .filter_map(|a| a.description.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        let examples = card
            .examples
            .iter()
            .map(|e| match &e.call_hint {
                Some(hint) => format!("{} {}", e.query, hint),
                None => e.query.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            tool_id: card.tool_id.clone(),
            name: card.tool_name.clone(),
            title: card.title.clone().unwrap_or_default(),
            description: card.description.clone().unwrap_or_default(),
            tags: card.tags.join(" "),
            synonyms: card.synonyms.join(" "),
            arg_names,
            arg_descs,
            examples,
            server_id: card.server_id.clone(),
        }
    }

    pub fn field(&self, field: SearchField) -> &str {
        match field {
            SearchField::Name => &self.name,
            SearchField::Title => &self.title,
            SearchField::Description => &self.description,
            SearchField::Tags => &self.tags,
            SearchField::Synonyms => &self.synonyms,
            SearchField::ArgNames => &self.arg_names,
            SearchField::ArgDescs => &self.arg_descs,
            SearchField::Examples => &self.examples,
            SearchField::ServerId => &self.server_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::card::{ToolArg, ToolExample};

    fn sample_card() -> ToolCard {
        let mut card = ToolCard::new("slack", "post_message")
            .with_title("Post message")
            .with_description("Send a message to a channel");
        card.tags = vec!["chat".into(), "messaging".into()];
        card.synonyms = vec!["send message".into()];
        card.args = vec![
            ToolArg {
                name: "channel".into(),
                description: Some("Channel name".into()),
                ..ToolArg::default()
            },
            ToolArg {
                name: "text".into(),
                ..ToolArg::default()
            },
        ];
        card.examples = vec![ToolExample {
            query: "post to slack".into(),
            call_hint: Some("use channel".into()),
        }];
        card
    }

    #[test]
    fn test_doc_derivation_flattens_fields() {
        let doc = ToolSearchDoc::from_card(&sample_card());
        assert_eq!(doc.tool_id, "slack:post_message");
        assert_eq!(doc.name, "post_message");
        assert_eq!(doc.tags, "chat messaging");
        assert_eq!(doc.arg_names, "channel text");
        assert_eq!(doc.arg_descs, "Channel name");
        assert_eq!(doc.examples, "post to slack use channel");
        assert_eq!(doc.server_id, "slack");
    }

    #[test]
    fn test_doc_derivation_is_pure() {
        let card = sample_card();
        assert_eq!(ToolSearchDoc::from_card(&card), ToolSearchDoc::from_card(&card));
    }

    #[test]
    fn test_field_accessor_covers_all_fields() {
        let doc = ToolSearchDoc::from_card(&sample_card());
        for field in SearchField::ALL {
            // every field resolves without panicking; name/serverId are non-empty
            let _ = doc.field(field);
        }
        assert_eq!(doc.field(SearchField::Name), "post_message");
        assert_eq!(doc.field(SearchField::ServerId), "slack");
    }

    #[test]
    fn test_search_field_serde_names() {
        assert_eq!(
            serde_json::to_string(&SearchField::ArgNames).unwrap(),
            "\"argNames\""
        );
        let parsed: SearchField = serde_json::from_str("\"serverId\"").unwrap();
        assert_eq!(parsed, SearchField::ServerId);
    }
}
