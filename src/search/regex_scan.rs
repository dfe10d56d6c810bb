//! Regex search mode: pattern matching over name, title, and description.

use regex::{Regex, RegexBuilder};

use crate::catalog::CatalogSnapshot;

use super::{PreparedFilters, SearchHit};

const NAME_WEIGHT: f64 = 2.0;
const TITLE_WEIGHT: f64 = 1.5;
const DESCRIPTION_WEIGHT: f64 = 1.0;

/// Compile the query case-insensitively; a pattern that fails to compile is
/// retried as an escaped literal rather than surfaced as an error.
fn compile(query: &str) -> Option<Regex> {
    RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .or_else(|err| {
            tracing::debug!(%err, "regex query failed to compile, matching literally");
            RegexBuilder::new(&regex::escape(query))
                .case_insensitive(true)
                .build()
        })
        .ok()
}

/// Match every filter-passing document, scoring by which fields matched.
/// Ordered score-descending with toolId ascending as the tie-break.
pub fn search(
    snapshot: &CatalogSnapshot,
    query: &str,
    filters: &PreparedFilters,
) -> Vec<SearchHit> {
    let Some(regex) = compile(query) else {
        return Vec::new();
    };

    let mut hits: Vec<SearchHit> = snapshot
        .docs
        .values()
        .filter(|doc| {
            let card = snapshot.tools.get(&doc.tool_id);
            filters.matches(
                &doc.server_id.to_lowercase(),
                card.map(|c| c.side_effect).unwrap_or_default(),
                &card
                    .map(|c| c.tags.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>())
                    .unwrap_or_default(),
            )
        })
        .filter_map(|doc| {
            let mut score = 0.0;
            if regex.is_match(&doc.name) {
                score += NAME_WEIGHT;
            }
            if regex.is_match(&doc.title) {
                score += TITLE_WEIGHT;
            }
            if regex.is_match(&doc.description) {
                score += DESCRIPTION_WEIGHT;
            }
            (score > 0.0).then(|| SearchHit {
                tool_id: doc.tool_id.clone(),
                score,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tool_id.cmp(&b.tool_id))
    });
    hits
}
