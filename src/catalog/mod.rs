//! Authoritative tool catalog with versioned, immutable snapshots.

mod card;
mod convert;
mod doc;

pub use card::{split_tool_id, CostHint, SideEffect, ToolArg, ToolCard, ToolExample};
pub use doc::{SearchField, ToolSearchDoc};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid tool card: {reason}")]
    InvalidCard { reason: String },

    #[error("catalog lock poisoned")]
    Poisoned,
}

/// Immutable view of the catalog at one version.
///
/// `tools` and `docs` always hold the same key set; the doc for a tool is
/// regenerated in the same mutation that writes the card.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    pub version: u64,
    pub updated_at: u64,
    pub tools: BTreeMap<String, ToolCard>,
    pub docs: BTreeMap<String, ToolSearchDoc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub tools: usize,
    pub index_size: usize,
    pub updated_at: u64,
}

/// Store of ToolCards keyed by toolId.
///
/// Mutations build a fresh snapshot and swap it in under the lock; readers
/// take an `Arc` and never observe a torn state. The version bumps only when
/// a mutation actually changed something, so the search engine can use it as
/// a cache key.
pub struct ToolCatalog {
    snapshot: Mutex<Arc<CatalogSnapshot>>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(Arc::new(CatalogSnapshot {
                version: 0,
                updated_at: now_ms(),
                tools: BTreeMap::new(),
                docs: BTreeMap::new(),
            })),
        }
    }

    /// Insert or overwrite cards by toolId, regenerating each affected doc.
    ///
    /// Every card is validated before any state changes; a bad card rejects
    /// the whole batch. Returns the number of cards actually applied; cards
    /// identical to their existing entry are skipped and not counted.
    pub fn upsert_tools(&self, tools: Vec<ToolCard>) -> Result<usize, CatalogError> {
        for card in &tools {
            card.validate()?;
        }

        let mut guard = self.snapshot.lock().map_err(|_| CatalogError::Poisoned)?;
        let mut next = (**guard).clone();
        let mut applied = 0;

        for card in tools {
            if next.tools.get(&card.tool_id) == Some(&card) {
                continue;
            }
            next.docs
                .insert(card.tool_id.clone(), ToolSearchDoc::from_card(&card));
            next.tools.insert(card.tool_id.clone(), card);
            applied += 1;
        }

        if applied > 0 {
            next.version += 1;
            next.updated_at = now_ms();
            tracing::debug!(
                version = next.version,
                applied,
                tools = next.tools.len(),
                "catalog upsert applied"
            );
            *guard = Arc::new(next);
        }
        Ok(applied)
    }

    /// Remove entries by toolId; returns how many were actually present.
    pub fn remove_tools(&self, tool_ids: &[String]) -> Result<usize, CatalogError> {
        let mut guard = self.snapshot.lock().map_err(|_| CatalogError::Poisoned)?;
        let mut next = (**guard).clone();
        let mut removed = 0;

        for tool_id in tool_ids {
            if next.tools.remove(tool_id).is_some() {
                next.docs.remove(tool_id);
                removed += 1;
            }
        }

        if removed > 0 {
            next.version += 1;
            next.updated_at = now_ms();
            tracing::debug!(version = next.version, removed, "catalog remove applied");
            *guard = Arc::new(next);
        }
        Ok(removed)
    }

    /// Clear the store. The version bumps only when there was state to clear.
    pub fn reset(&self) -> Result<(), CatalogError> {
        let mut guard = self.snapshot.lock().map_err(|_| CatalogError::Poisoned)?;
        if guard.tools.is_empty() {
            return Ok(());
        }
        let next = CatalogSnapshot {
            version: guard.version + 1,
            updated_at: now_ms(),
            tools: BTreeMap::new(),
            docs: BTreeMap::new(),
        };
        tracing::debug!(version = next.version, "catalog reset");
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn stats(&self) -> CatalogStats {
        let snapshot = self.snapshot_arc();
        CatalogStats {
            tools: snapshot.tools.len(),
            index_size: snapshot.docs.len(),
            updated_at: snapshot.updated_at,
        }
    }

    pub fn get_tool(&self, tool_id: &str) -> Option<ToolCard> {
        self.snapshot_arc().tools.get(tool_id).cloned()
    }

    /// Current snapshot; cheap to take and safe to hold across mutations.
    pub fn snapshot_arc(&self) -> Arc<CatalogSnapshot> {
        match self.snapshot.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(server: &str, name: &str) -> ToolCard {
        ToolCard::new(server, name).with_description("a test tool")
    }

    #[test]
    fn test_upsert_bumps_version_once_per_batch() {
        let catalog = ToolCatalog::new();
        assert_eq!(catalog.snapshot_arc().version, 0);

        let n = catalog
            .upsert_tools(vec![card("a", "one"), card("a", "two")])
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(catalog.snapshot_arc().version, 1);
        assert_eq!(catalog.stats().tools, 2);
    }

    #[test]
    fn test_identical_upsert_does_not_bump_version() {
        let catalog = ToolCatalog::new();
        assert_eq!(catalog.upsert_tools(vec![card("a", "one")]).unwrap(), 1);
        let v = catalog.snapshot_arc().version;

        assert_eq!(catalog.upsert_tools(vec![card("a", "one")]).unwrap(), 0);
        assert_eq!(catalog.snapshot_arc().version, v);

        // a mixed batch counts only the cards that actually changed
        let applied = catalog
            .upsert_tools(vec![card("a", "one"), card("b", "two")])
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(catalog.snapshot_arc().version, v + 1);

        assert_eq!(
            catalog
                .upsert_tools(vec![card("a", "one").with_title("changed")])
                .unwrap(),
            1
        );
        assert_eq!(catalog.snapshot_arc().version, v + 2);
    }

    #[test]
    fn test_empty_operations_do_not_bump_version() {
        let catalog = ToolCatalog::new();
        catalog.upsert_tools(Vec::new()).unwrap();
        catalog.remove_tools(&[]).unwrap();
        catalog.reset().unwrap();
        assert_eq!(catalog.snapshot_arc().version, 0);
    }

    #[test]
    fn test_remove_counts_only_present_keys() {
        let catalog = ToolCatalog::new();
        catalog.upsert_tools(vec![card("a", "one")]).unwrap();
        let removed = catalog
            .remove_tools(&["a:one".to_string(), "a:missing".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(catalog.snapshot_arc().version, 2);

        // removing nothing leaves the version alone
        let removed = catalog.remove_tools(&["a:missing".to_string()]).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(catalog.snapshot_arc().version, 2);
    }

    #[test]
    fn test_reset_clears_and_bumps_once() {
        let catalog = ToolCatalog::new();
        catalog.upsert_tools(vec![card("a", "one")]).unwrap();
        catalog.reset().unwrap();
        assert_eq!(catalog.stats().tools, 0);
        assert_eq!(catalog.snapshot_arc().version, 2);
        // resetting an empty store is a no-op
        catalog.reset().unwrap();
        assert_eq!(catalog.snapshot_arc().version, 2);
    }

    #[test]
    fn test_snapshot_keys_stay_consistent() {
        let catalog = ToolCatalog::new();
        catalog
            .upsert_tools(vec![card("a", "one"), card("b", "two")])
            .unwrap();
        catalog.remove_tools(&["a:one".to_string()]).unwrap();

        let snapshot = catalog.snapshot_arc();
        let tool_keys: Vec<_> = snapshot.tools.keys().collect();
        let doc_keys: Vec<_> = snapshot.docs.keys().collect();
        assert_eq!(tool_keys, doc_keys);

        let stats = catalog.stats();
        assert_eq!(stats.tools, stats.index_size);
    }

    #[test]
    fn test_invalid_card_rejects_whole_batch() {
        let catalog = ToolCatalog::new();
        let bad = ToolCard {
            tool_name: "x".into(),
            server_id: "s".into(),
            ..ToolCard::default()
        };
        let result = catalog.upsert_tools(vec![card("a", "one"), bad]);
        assert!(result.is_err());
        assert_eq!(catalog.stats().tools, 0);
        assert_eq!(catalog.snapshot_arc().version, 0);
    }

    #[test]
    fn test_snapshot_is_immutable_under_mutation() {
        let catalog = ToolCatalog::new();
        catalog.upsert_tools(vec![card("a", "one")]).unwrap();
        let before = catalog.snapshot_arc();
        catalog.upsert_tools(vec![card("b", "two")]).unwrap();
        assert_eq!(before.tools.len(), 1);
        assert_eq!(catalog.snapshot_arc().tools.len(), 2);
    }

    #[test]
    fn test_get_tool() {
        let catalog = ToolCatalog::new();
        catalog.upsert_tools(vec![card("a", "one")]).unwrap();
        assert!(catalog.get_tool("a:one").is_some());
        assert!(catalog.get_tool("a:none").is_none());
    }
}
