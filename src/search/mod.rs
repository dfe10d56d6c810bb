//! Tool search over catalog snapshots: BM25 ranking or regex scanning.

mod bm25;
mod regex_scan;

pub use bm25::{Bm25Index, Bm25Params, FieldWeights};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::catalog::{SearchField, SideEffect, ToolCatalog};

/// Which ranking implementation serves a query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Bm25,
    Regex,
}

/// Pre-scoring filters. A document passes when every non-empty filter
/// matches; comparisons are case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub server_ids: Vec<String>,
    pub side_effects: Vec<SideEffect>,
    pub tags: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.server_ids.is_empty() && self.side_effects.is_empty() && self.tags.is_empty()
    }
}

/// Lowercased filter sets, prepared once per query.
pub struct PreparedFilters {
    server_ids: HashSet<String>,
    side_effects: HashSet<SideEffect>,
    tags: HashSet<String>,
}

impl From<&SearchFilters> for PreparedFilters {
    fn from(filters: &SearchFilters) -> Self {
        Self {
            server_ids: filters
                .server_ids
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            side_effects: filters.side_effects.iter().copied().collect(),
            tags: filters.tags.iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

impl PreparedFilters {
    /// `server_id_lower` and `tags_lower` must already be lowercased by the
    /// caller; `side_effect` is the effective value (default `none`).
    pub fn matches(
        &self,
        server_id_lower: &str,
        side_effect: SideEffect,
        tags_lower: &[String],
    ) -> bool {
        if !self.server_ids.is_empty() && !self.server_ids.contains(server_id_lower) {
            return false;
        }
        if !self.side_effects.is_empty() && !self.side_effects.contains(&side_effect) {
            return false;
        }
        if !self.tags.is_empty() && !tags_lower.iter().any(|tag| self.tags.contains(tag)) {
            return false;
        }
        true
    }
}

/// One search request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQueryInput {
    pub query: String,
    pub top_k: Option<i64>,
    pub mode: Option<SearchMode>,
    pub filters: Option<SearchFilters>,
    pub field_weights: Option<HashMap<SearchField, f64>>,
}

impl SearchQueryInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub tool_id: String,
    pub score: f64,
}

/// `before` counts every document in the snapshot; `after` counts hits that
/// passed filters and the score threshold, before topK truncation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCounts {
    pub before: usize,
    pub after: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQueryResult {
    pub hits: Vec<SearchHit>,
    pub candidates: CandidateCounts,
}

/// Search front end with a version-checked index cache.
///
/// The BM25 index is rebuilt lazily: the first query after a catalog change
/// observes the new snapshot version and rebuilds before scoring. Regex mode
/// scans the snapshot directly and needs no index.
pub struct SearchEngine {
    catalog: Arc<ToolCatalog>,
    params: Bm25Params,
    index: Mutex<Option<Arc<Bm25Index>>>,
}

impl SearchEngine {
    pub fn new(catalog: Arc<ToolCatalog>, params: Bm25Params) -> Self {
        Self {
            catalog,
            params,
            index: Mutex::new(None),
        }
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    pub fn query(&self, input: &SearchQueryInput) -> SearchQueryResult {
        let snapshot = self.catalog.snapshot_arc();
        let filters = PreparedFilters::from(input.filters.as_ref().unwrap_or(&SearchFilters::default()));

        let scored = match input.mode.unwrap_or_default() {
            SearchMode::Bm25 => {
                let weights = match &input.field_weights {
                    Some(overrides) => self.params.field_weights.with_overrides(overrides),
                    None => self.params.field_weights,
                };
                self.ensure_index(&snapshot)
                    .search(&input.query, &self.params, &weights, &filters)
            }
            SearchMode::Regex => regex_scan::search(&snapshot, &input.query, &filters),
        };

        let candidates = CandidateCounts {
            before: snapshot.docs.len(),
            after: scored.len(),
        };
        let top_k = input.top_k.unwrap_or(self.params.default_top_k as i64);
        let hits = if top_k <= 0 {
            Vec::new()
        } else {
            scored.into_iter().take(top_k as usize).collect()
        };

        SearchQueryResult { hits, candidates }
    }

    fn ensure_index(&self, snapshot: &crate::catalog::CatalogSnapshot) -> Arc<Bm25Index> {
        let mut guard = match self.index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(index) if index.version() == snapshot.version => Arc::clone(index),
            _ => {
                tracing::debug!(
                    version = snapshot.version,
                    docs = snapshot.docs.len(),
                    "rebuilding search index"
                );
                let index = Arc::new(Bm25Index::build(snapshot));
                *guard = Some(Arc::clone(&index));
                index
            }
        }
    }
}
