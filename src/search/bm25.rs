//! Field-weighted BM25 over catalog snapshots.

use std::collections::{HashMap, HashSet};

use crate::catalog::{CatalogSnapshot, SearchField, SideEffect};
use crate::text;

use super::{PreparedFilters, SearchHit};

/// BM25 parameters and ranking boosts. All values are configurable; the
/// defaults are tuned for short tool-card documents.
#[derive(Clone, Debug)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub exact_match_boost: f64,
    pub prefix_match_boost: f64,
    pub popularity_boost: f64,
    pub min_score: f64,
    pub default_top_k: usize,
    pub field_weights: FieldWeights,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            exact_match_boost: 1.5,
            prefix_match_boost: 0.4,
            popularity_boost: 0.05,
            min_score: 0.0,
            default_top_k: 20,
            field_weights: FieldWeights::default(),
        }
    }
}

/// Per-field scoring weights, indexed by [`SearchField::ordinal`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldWeights([f64; 9]);

impl Default for FieldWeights {
    fn default() -> Self {
        let mut weights = Self([0.0; 9]);
        weights.set(SearchField::Name, 4.0);
        weights.set(SearchField::Title, 2.0);
        weights.set(SearchField::Synonyms, 2.5);
        weights.set(SearchField::Description, 1.8);
        weights.set(SearchField::ArgNames, 1.4);
        weights.set(SearchField::ArgDescs, 1.2);
        weights.set(SearchField::Tags, 1.2);
        weights.set(SearchField::Examples, 0.9);
        weights.set(SearchField::ServerId, 0.2);
        weights
    }
}

impl FieldWeights {
    pub fn get(&self, field: SearchField) -> f64 {
        self.0[field.ordinal()]
    }

    pub fn set(&mut self, field: SearchField, weight: f64) {
        self.0[field.ordinal()] = weight;
    }

    /// Copy with per-query overrides applied on top.
    pub fn with_overrides(&self, overrides: &HashMap<SearchField, f64>) -> Self {
        let mut weights = *self;
        for (field, weight) in overrides {
            weights.set(*field, *weight);
        }
        weights
    }
}

struct FieldPostings {
    term_freq: HashMap<String, u32>,
    len: u32,
}

struct IndexedDoc {
    tool_id: String,
    fields: Vec<FieldPostings>,
    name_norm: String,
    popularity: Option<f64>,
    server_id_lower: String,
    side_effect: SideEffect,
    tags_lower: Vec<String>,
}

/// Inverted per-field index built from one catalog snapshot.
///
/// Tagged with the snapshot version it was built from; the engine rebuilds
/// whenever the observed version differs.
pub struct Bm25Index {
    version: u64,
    docs: Vec<IndexedDoc>,
    doc_freq: HashMap<String, u32>,
    avg_field_len: [f64; 9],
}

impl Bm25Index {
    pub fn build(snapshot: &CatalogSnapshot) -> Self {
        let mut docs = Vec::with_capacity(snapshot.docs.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut total_field_len = [0u64; 9];

        for (tool_id, doc) in &snapshot.docs {
            let mut fields = Vec::with_capacity(SearchField::ALL.len());
            let mut unique: HashSet<&str> = HashSet::new();

            for field in SearchField::ALL {
                let tokens = text::tokenize(doc.field(field));
                let len = tokens.len() as u32;
                total_field_len[field.ordinal()] += u64::from(len);

                let mut term_freq: HashMap<String, u32> = HashMap::new();
                for token in tokens {
                    *term_freq.entry(token).or_insert(0) += 1;
                }
                fields.push(FieldPostings { term_freq, len });
            }
            for postings in &fields {
                unique.extend(postings.term_freq.keys().map(String::as_str));
            }
            for token in unique {
                *doc_freq.entry(token.to_string()).or_insert(0) += 1;
            }

            let card = snapshot.tools.get(tool_id);
            docs.push(IndexedDoc {
                tool_id: tool_id.clone(),
                fields,
                name_norm: text::normalize_for_match(&doc.name),
                popularity: card.and_then(|c| c.popularity),
                server_id_lower: doc.server_id.to_lowercase(),
                side_effect: card.map(|c| c.side_effect).unwrap_or_default(),
                tags_lower: card
                    .map(|c| c.tags.iter().map(|t| t.to_lowercase()).collect())
                    .unwrap_or_default(),
            });
        }

        let doc_count = docs.len().max(1) as f64;
        let mut avg_field_len = [0.0; 9];
        for (ordinal, total) in total_field_len.iter().enumerate() {
            avg_field_len[ordinal] = *total as f64 / doc_count;
        }

        Self {
            version: snapshot.version,
            docs,
            doc_freq,
            avg_field_len,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    /// Score every filter-passing document, keeping hits above `min_score`,
    /// ordered score-descending with toolId as the tie-break.
    pub fn search(
        &self,
        query: &str,
        params: &Bm25Params,
        weights: &FieldWeights,
        filters: &PreparedFilters,
    ) -> Vec<SearchHit> {
        let tokens = text::tokenize(query);
        let mut query_counts: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            *query_counts.entry(token.as_str()).or_insert(0) += 1;
        }

        let trimmed = query.trim();
        let query_norm = (!trimmed.is_empty()).then(|| text::normalize_for_match(trimmed));
        let total_docs = self.docs.len() as f64;

        let mut hits: Vec<SearchHit> = self
            .docs
            .iter()
            .filter(|doc| filters.matches(&doc.server_id_lower, doc.side_effect, &doc.tags_lower))
            .filter_map(|doc| {
                let mut score = 0.0;

                for (token, qtf) in &query_counts {
                    let Some(df) = self.doc_freq.get(*token) else {
                        continue;
                    };
                    let df = f64::from(*df);
                    let idf = (1.0 + (total_docs - df + 0.5) / (df + 0.5)).ln();
                    let query_weight = 1.0 + f64::from(*qtf).ln();

                    for field in SearchField::ALL {
                        let postings = &doc.fields[field.ordinal()];
                        let Some(tf) = postings.term_freq.get(*token) else {
                            continue;
                        };
                        let avg_len = match self.avg_field_len[field.ordinal()] {
                            avg if avg > 0.0 => avg,
                            _ => 1.0,
                        };
                        score += weights.get(field)
                            * idf
                            * query_weight
                            * bm25_tf(f64::from(*tf), f64::from(postings.len), avg_len, params);
                    }
                }

                if let Some(query_norm) = &query_norm {
                    if *query_norm == doc.name_norm {
                        score += params.exact_match_boost;
                    } else if doc.name_norm.starts_with(query_norm.as_str()) {
                        score += params.prefix_match_boost;
                    }
                    if let Some(popularity) = doc.popularity {
                        score += (1.0 + popularity.max(0.0)).ln() * params.popularity_boost;
                    }
                }

                (score > params.min_score).then(|| SearchHit {
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
}

fn bm25_tf(tf: f64, field_len: f64, avg_len: f64, params: &Bm25Params) -> f64 {
    if tf <= 0.0 {
        return 0.0;
    }
    tf * (params.k1 + 1.0) / (tf + params.k1 * (1.0 - params.b + params.b * field_len / avg_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ToolCard, ToolCatalog};
    use crate::search::SearchFilters;

    fn snapshot_with(cards: Vec<ToolCard>) -> std::sync::Arc<CatalogSnapshot> {
        let catalog = ToolCatalog::new();
        catalog.upsert_tools(cards).unwrap();
        catalog.snapshot_arc()
    }

    fn no_filters() -> PreparedFilters {
        PreparedFilters::from(&SearchFilters::default())
    }

    #[test]
    fn test_scores_are_deterministic() {
        let snapshot = snapshot_with(vec![
            ToolCard::new("slack", "post_message").with_description("Send a chat message"),
            ToolCard::new("slack", "search_messages").with_description("Search chat history"),
        ]);
        let index = Bm25Index::build(&snapshot);
        let params = Bm25Params::default();

        let a = index.search("post message", &params, &params.field_weights, &no_filters());
        let b = index.search("post message", &params, &params.field_weights, &no_filters());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.tool_id, y.tool_id);
            assert_eq!(x.score, y.score);
        }
    }

    #[test]
    fn test_exact_name_beats_partial() {
        let snapshot = snapshot_with(vec![
            ToolCard::new("slack", "post_message").with_description("Send a message"),
            ToolCard::new("slack", "search_messages").with_description("Search messages"),
        ]);
        let index = Bm25Index::build(&snapshot);
        let params = Bm25Params::default();

        let hits = index.search("post_message", &params, &params.field_weights, &no_filters());
        assert_eq!(hits[0].tool_id, "slack:post_message");
        assert!(hits[0].score > hits.get(1).map(|h| h.score).unwrap_or(0.0));
    }

    #[test]
    fn test_unknown_tokens_are_skipped() {
        let snapshot = snapshot_with(vec![ToolCard::new("a", "alpha_tool")]);
        let index = Bm25Index::build(&snapshot);
        let params = Bm25Params::default();

        let hits = index.search(
            "zzz_not_in_corpus",
            &params,
            &params.field_weights,
            &no_filters(),
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_popularity_boost_orders_equal_docs() {
        let snapshot = snapshot_with(vec![
            ToolCard::new("a", "copy_file").with_popularity(100.0),
            ToolCard::new("b", "copy_file"),
        ]);
        let index = Bm25Index::build(&snapshot);
        let params = Bm25Params::default();

        let hits = index.search("copy file", &params, &params.field_weights, &no_filters());
        assert_eq!(hits[0].tool_id, "a:copy_file");
    }

    #[test]
    fn test_tie_break_is_tool_id_ascending() {
        let snapshot = snapshot_with(vec![
            ToolCard::new("b", "same_tool"),
            ToolCard::new("a", "same_tool"),
        ]);
        let index = Bm25Index::build(&snapshot);
        let params = Bm25Params::default();

        let hits = index.search("same tool", &params, &params.field_weights, &no_filters());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, hits[1].score);
        assert_eq!(hits[0].tool_id, "a:same_tool");
    }

    #[test]
    fn test_field_weight_override() {
        let snapshot = snapshot_with(vec![
            ToolCard::new("a", "unrelated").with_description("archive records"),
            ToolCard::new("b", "records_archive"),
        ]);
        let index = Bm25Index::build(&snapshot);
        let params = Bm25Params::default();

        // zero out every field except description: only the description match
        // can score now
        let mut overrides = HashMap::new();
        for field in SearchField::ALL {
            overrides.insert(field, 0.0);
        }
        overrides.insert(SearchField::Description, 1.0);
        let weights = params.field_weights.with_overrides(&overrides);

        let hits = index.search("archive", &params, &weights, &no_filters());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tool_id, "a:unrelated");
    }
}
