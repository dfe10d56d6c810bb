//! Per-session working sets: the shortlist of tools currently "live" for a
//! session, maintained under a token budget.

mod clock;
mod cost;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cost::{estimate_tool_tokens, MIN_TOOL_COST};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::catalog::ToolCatalog;
use crate::search::{SearchEngine, SearchMode, SearchQueryInput};

#[derive(Clone, Debug)]
pub struct WorkingSetConfig {
    pub default_budget_tokens: u64,
    /// TTL stamped onto newly created entries; 0 disables expiry.
    pub default_ttl_ms: u64,
    /// Hard cap on entries per session; 0 disables the cap.
    pub max_entries: usize,
    /// Cost assigned to toolIds the catalog does not know.
    pub unknown_tool_cost: u64,
}

impl Default for WorkingSetConfig {
    fn default() -> Self {
        Self {
            default_budget_tokens: 1_500,
            default_ttl_ms: 30 * 60 * 1_000,
            max_entries: 0,
            unknown_tool_cost: 120,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSetEntry {
    pub tool_id: String,
    pub pinned: bool,
    /// Monotonic milliseconds; 0 means never.
    pub last_used_at: u64,
    pub last_selected_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    pub token_cost: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_hint: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSetState {
    pub session_id: String,
    pub entries: BTreeMap<String, WorkingSetEntry>,
    pub budget_tokens: u64,
    pub used_tokens: u64,
}

impl WorkingSetState {
    fn new(session_id: impl Into<String>, budget_tokens: u64) -> Self {
        Self {
            session_id: session_id.into(),
            entries: BTreeMap::new(),
            budget_tokens,
            used_tokens: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSetUpdateInput {
    pub session_id: String,
    #[serde(default)]
    pub query: String,
    pub budget_tokens: u64,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub pin: Vec<String>,
    #[serde(default)]
    pub unpin: Vec<String>,
    #[serde(default)]
    pub mode: Option<SearchMode>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSetUpdateResult {
    pub selected_tool_ids: Vec<String>,
    pub added_tool_ids: Vec<String>,
    pub removed_tool_ids: Vec<String>,
    pub budget_used: u64,
    pub budget_total: u64,
}

/// Session-partitioned working-set manager.
///
/// Sessions never interact; each `update` runs the fixed pipeline: resolve
/// session, pins, unpins, TTL expiry, search, entry cap, budget, selection.
/// TTLs are evaluated lazily here; there are no background timers.
pub struct WorkingSetManager {
    config: WorkingSetConfig,
    catalog: Arc<ToolCatalog>,
    search: Arc<SearchEngine>,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, WorkingSetState>>,
}

impl WorkingSetManager {
    pub fn new(
        config: WorkingSetConfig,
        catalog: Arc<ToolCatalog>,
        search: Arc<SearchEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            catalog,
            search,
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Defensive copy of the session state, created empty on first access.
    pub fn get(&self, session_id: &str) -> WorkingSetState {
        let mut sessions = self.lock_sessions();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                WorkingSetState::new(session_id, self.config.default_budget_tokens)
            })
            .clone()
    }

    pub fn reset(&self, session_id: &str) {
        self.lock_sessions().remove(session_id);
    }

    /// Record a tool invocation for recency. Creates a non-pinned entry when
    /// the tool is not in the set; never evicts.
    pub fn mark_used(&self, session_id: &str, tool_id: &str) {
        let now = self.clock.now_ms();
        let mut sessions = self.lock_sessions();
        let state = sessions.entry(session_id.to_string()).or_insert_with(|| {
            WorkingSetState::new(session_id, self.config.default_budget_tokens)
        });

        match state.entries.get_mut(tool_id) {
            Some(entry) => {
                entry.last_used_at = now;
                entry.last_selected_at = now;
            }
            None => {
                state.entries.insert(
                    tool_id.to_string(),
                    WorkingSetEntry {
                        tool_id: tool_id.to_string(),
                        pinned: false,
                        last_used_at: now,
                        last_selected_at: now,
                        ttl_ms: self.default_ttl(),
                        token_cost: self.estimate(tool_id),
                        score_hint: None,
                    },
                );
            }
        }
        state.used_tokens = state.entries.values().map(|e| e.token_cost).sum();
    }

    pub fn update(&self, input: &WorkingSetUpdateInput) -> WorkingSetUpdateResult {
        let now = self.clock.now_ms();
        let mut sessions = self.lock_sessions();
        let state = sessions
            .entry(input.session_id.clone())
            .or_insert_with(|| {
                WorkingSetState::new(&input.session_id, self.config.default_budget_tokens)
            });
        state.budget_tokens = input.budget_tokens;

        let mut added: BTreeSet<String> = BTreeSet::new();
        let mut removed: BTreeSet<String> = BTreeSet::new();

        for tool_id in &input.pin {
            match state.entries.get_mut(tool_id) {
                Some(entry) => {
                    entry.pinned = true;
                    entry.last_selected_at = now;
                }
                None => {
                    state.entries.insert(
                        tool_id.clone(),
                        WorkingSetEntry {
                            tool_id: tool_id.clone(),
                            pinned: true,
                            last_used_at: 0,
                            last_selected_at: now,
                            ttl_ms: self.default_ttl(),
                            token_cost: self.estimate(tool_id),
                            score_hint: None,
                        },
                    );
                    added.insert(tool_id.clone());
                }
            }
        }

        for tool_id in &input.unpin {
            if let Some(entry) = state.entries.get_mut(tool_id) {
                entry.pinned = false;
            }
        }

        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|entry| {
                !entry.pinned
                    && entry.ttl_ms.is_some_and(|ttl| {
                        ttl > 0
                            && now.saturating_sub(entry.last_used_at.max(entry.last_selected_at))
                                > ttl
                    })
            })
            .map(|entry| entry.tool_id.clone())
            .collect();
        for tool_id in expired {
            state.entries.remove(&tool_id);
            removed.insert(tool_id);
        }

        let search_result = self.search.query(&SearchQueryInput {
            query: input.query.clone(),
            top_k: input.top_k,
            mode: input.mode,
            filters: None,
            field_weights: None,
        });
        for hit in search_result.hits {
            match state.entries.get_mut(&hit.tool_id) {
                Some(entry) => {
                    entry.last_selected_at = now;
                    entry.score_hint = Some(hit.score);
                }
                None => {
                    let entry = WorkingSetEntry {
                        tool_id: hit.tool_id.clone(),
                        pinned: false,
                        last_used_at: 0,
                        last_selected_at: now,
                        ttl_ms: self.default_ttl(),
                        token_cost: self.estimate(&hit.tool_id),
                        score_hint: Some(hit.score),
                    };
                    state.entries.insert(hit.tool_id.clone(), entry);
                    added.insert(hit.tool_id);
                }
            }
        }

        if self.config.max_entries > 0 {
            while state.entries.len() > self.config.max_entries {
                let Some(victim) = eviction_candidate(&state.entries) else {
                    break;
                };
                state.entries.remove(&victim);
                removed.insert(victim);
            }
        }

        let mut used: u64 = state.entries.values().map(|e| e.token_cost).sum();
        while used > state.budget_tokens {
            let Some(victim) = eviction_candidate(&state.entries) else {
                tracing::debug!(
                    session = %state.session_id,
                    used,
                    budget = state.budget_tokens,
                    "pinned entries exceed budget, keeping overflow"
                );
                break;
            };
            if let Some(entry) = state.entries.remove(&victim) {
                used -= entry.token_cost;
            }
            removed.insert(victim);
        }

        let mut ordered: Vec<&WorkingSetEntry> = state.entries.values().collect();
        ordered.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then(b.last_selected_at.cmp(&a.last_selected_at))
                .then(b.last_used_at.cmp(&a.last_used_at))
                .then(
                    b.score_hint
                        .unwrap_or(0.0)
                        .partial_cmp(&a.score_hint.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then_with(|| a.tool_id.cmp(&b.tool_id))
        });
        let selected_tool_ids: Vec<String> =
            ordered.into_iter().map(|e| e.tool_id.clone()).collect();

        state.used_tokens = used;
        let added_tool_ids: Vec<String> = added.difference(&removed).cloned().collect();

        WorkingSetUpdateResult {
            selected_tool_ids,
            added_tool_ids,
            removed_tool_ids: removed.into_iter().collect(),
            budget_used: used,
            budget_total: state.budget_tokens,
        }
    }

    fn default_ttl(&self) -> Option<u64> {
        (self.config.default_ttl_ms > 0).then_some(self.config.default_ttl_ms)
    }

    fn estimate(&self, tool_id: &str) -> u64 {
        match self.catalog.get_tool(tool_id) {
            Some(card) => estimate_tool_tokens(&card),
            None => self.config.unknown_tool_cost,
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, WorkingSetState>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Worst-first eviction ranking over non-pinned entries: oldest selection,
/// then oldest use, then lowest score, then toolId.
fn eviction_candidate(entries: &BTreeMap<String, WorkingSetEntry>) -> Option<String> {
    entries
        .values()
        .filter(|entry| !entry.pinned)
        .min_by(|a, b| {
            a.last_selected_at
                .cmp(&b.last_selected_at)
                .then(a.last_used_at.cmp(&b.last_used_at))
                .then(
                    a.score_hint
                        .unwrap_or(0.0)
                        .partial_cmp(&b.score_hint.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then_with(|| a.tool_id.cmp(&b.tool_id))
        })
        .map(|entry| entry.tool_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolCard;
    use crate::search::Bm25Params;

    fn manager_with(
        cards: Vec<ToolCard>,
        config: WorkingSetConfig,
    ) -> (WorkingSetManager, Arc<ManualClock>) {
        let catalog = Arc::new(ToolCatalog::new());
        catalog.upsert_tools(cards).unwrap();
        let search = Arc::new(SearchEngine::new(
            Arc::clone(&catalog),
            Bm25Params::default(),
        ));
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = WorkingSetManager::new(
            config,
            catalog,
            search,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (manager, clock)
    }

    fn update_input(session: &str, query: &str, budget: u64) -> WorkingSetUpdateInput {
        WorkingSetUpdateInput {
            session_id: session.into(),
            query: query.into(),
            budget_tokens: budget,
            ..WorkingSetUpdateInput::default()
        }
    }

    #[test]
    fn test_get_creates_empty_state_with_default_budget() {
        let (manager, _) = manager_with(Vec::new(), WorkingSetConfig::default());
        let state = manager.get("s1");
        assert_eq!(state.session_id, "s1");
        assert!(state.entries.is_empty());
        assert_eq!(state.budget_tokens, 1_500);
        assert_eq!(state.used_tokens, 0);
    }

    #[test]
    fn test_get_returns_defensive_copy() {
        let (manager, _) = manager_with(Vec::new(), WorkingSetConfig::default());
        let mut copy = manager.get("s1");
        copy.budget_tokens = 9;
        copy.entries.insert(
            "x".into(),
            WorkingSetEntry {
                tool_id: "x".into(),
                pinned: false,
                last_used_at: 0,
                last_selected_at: 0,
                ttl_ms: None,
                token_cost: 1,
                score_hint: None,
            },
        );
        let fresh = manager.get("s1");
        assert_eq!(fresh.budget_tokens, 1_500);
        assert!(fresh.entries.is_empty());
    }

    #[test]
    fn test_update_selects_hits_and_tracks_budget() {
        let (manager, _) = manager_with(
            vec![
                ToolCard::new("slack", "post_message").with_description("Send a chat message"),
                ToolCard::new("slack", "search_messages")
                    .with_description("Search message history"),
            ],
            WorkingSetConfig::default(),
        );

        let result = manager.update(&update_input("s1", "message", 1_500));
        assert_eq!(result.selected_tool_ids.len(), 2);
        assert_eq!(result.added_tool_ids.len(), 2);
        assert!(result.removed_tool_ids.is_empty());
        assert!(result.budget_used > 0 && result.budget_used <= 1_500);

        let state = manager.get("s1");
        let sum: u64 = state.entries.values().map(|e| e.token_cost).sum();
        assert_eq!(state.used_tokens, sum);
    }

    #[test]
    fn test_budget_eviction_removes_oldest_selection() {
        let (manager, clock) = manager_with(
            vec![
                ToolCard::new("a", "alpha_tool").with_description("performs alpha duties"),
                ToolCard::new("b", "beta_tool").with_description("performs beta duties"),
            ],
            WorkingSetConfig::default(),
        );

        manager.update(&update_input("s1", "alpha", 1_500));
        clock.advance(10);
        // budget only fits one entry now; alpha was selected earlier, so it
        // is the eviction candidate
        let cost = manager.get("s1").entries["a:alpha_tool"].token_cost;
        let result = manager.update(&update_input("s1", "beta", cost + 1));

        assert_eq!(result.selected_tool_ids, vec!["b:beta_tool".to_string()]);
        assert_eq!(result.removed_tool_ids, vec!["a:alpha_tool".to_string()]);
        assert!(result.budget_used <= result.budget_total);
    }

    #[test]
    fn test_pinned_entries_survive_budget_pressure() {
        let (manager, clock) = manager_with(
            vec![
                ToolCard::new("a", "alpha_tool").with_description("performs alpha duties"),
                ToolCard::new("b", "beta_tool").with_description("performs beta duties"),
            ],
            WorkingSetConfig::default(),
        );

        let mut input = update_input("s1", "", 1_500);
        input.pin = vec!["a:alpha_tool".into()];
        manager.update(&input);
        clock.advance(10);

        // budget below the pinned entry's own cost: pin survives, beta goes
        let result = manager.update(&update_input("s1", "beta", 10));
        assert_eq!(result.selected_tool_ids, vec!["a:alpha_tool".to_string()]);
        assert!(result.removed_tool_ids.contains(&"b:beta_tool".to_string()));
        // documented overflow: pinned cost alone exceeds the budget
        assert!(result.budget_used > result.budget_total);
    }

    #[test]
    fn test_unpin_makes_entry_evictable() {
        let (manager, clock) = manager_with(
            vec![ToolCard::new("a", "alpha_tool").with_description("performs alpha duties")],
            WorkingSetConfig::default(),
        );

        let mut input = update_input("s1", "", 1_500);
        input.pin = vec!["a:alpha_tool".into()];
        manager.update(&input);
        clock.advance(10);

        let mut input = update_input("s1", "", 0);
        input.unpin = vec!["a:alpha_tool".into()];
        let result = manager.update(&input);
        assert!(result.selected_tool_ids.is_empty());
        assert_eq!(result.removed_tool_ids, vec!["a:alpha_tool".to_string()]);
    }

    #[test]
    fn test_ttl_expiry_is_lazy_and_skips_pinned() {
        let config = WorkingSetConfig {
            default_ttl_ms: 100,
            ..WorkingSetConfig::default()
        };
        let (manager, clock) = manager_with(
            vec![
                ToolCard::new("a", "alpha_tool").with_description("performs alpha duties"),
                ToolCard::new("b", "beta_tool").with_description("performs beta duties"),
            ],
            config,
        );

        let mut input = update_input("s1", "alpha", 1_500);
        input.pin = vec!["b:beta_tool".into()];
        manager.update(&input);

        clock.advance(101);
        let result = manager.update(&update_input("s1", "", 1_500));
        assert_eq!(result.removed_tool_ids, vec!["a:alpha_tool".to_string()]);
        assert_eq!(result.selected_tool_ids, vec!["b:beta_tool".to_string()]);
    }

    #[test]
    fn test_mark_used_updates_recency_and_creates_entries() {
        let (manager, clock) = manager_with(Vec::new(), WorkingSetConfig::default());
        clock.set(5_000);
        manager.mark_used("s1", "ghost:tool");

        let state = manager.get("s1");
        let entry = &state.entries["ghost:tool"];
        assert!(!entry.pinned);
        assert_eq!(entry.last_used_at, 5_000);
        assert_eq!(entry.last_selected_at, 5_000);
        assert_eq!(entry.token_cost, 120);
        assert_eq!(state.used_tokens, 120);
    }

    #[test]
    fn test_max_entries_cap() {
        let config = WorkingSetConfig {
            max_entries: 1,
            ..WorkingSetConfig::default()
        };
        let (manager, _) = manager_with(
            vec![
                ToolCard::new("a", "copy_tool").with_description("copies things around"),
                ToolCard::new("b", "copy_tool").with_description("copies things around"),
            ],
            config,
        );

        let result = manager.update(&update_input("s1", "copy", 10_000));
        assert_eq!(result.selected_tool_ids.len(), 1);
        assert_eq!(result.removed_tool_ids.len(), 1);
        assert_eq!(manager.get("s1").entries.len(), 1);
    }

    #[test]
    fn test_added_excludes_entries_removed_in_same_update() {
        let (manager, _) = manager_with(
            vec![
                ToolCard::new("a", "copy_tool").with_description("copies things around"),
                ToolCard::new("b", "copy_tool").with_description("copies things around"),
            ],
            WorkingSetConfig::default(),
        );

        // budget fits one entry: both are added by search, one is evicted in
        // the same update and must not be reported as added
        let cost = 120;
        let result = manager.update(&update_input("s1", "copy", cost));
        let overlap: Vec<_> = result
            .added_tool_ids
            .iter()
            .filter(|id| result.removed_tool_ids.contains(id))
            .collect();
        assert!(overlap.is_empty());
        assert_eq!(
            result.added_tool_ids.len() + result.removed_tool_ids.len(),
            2
        );
    }

    #[test]
    fn test_sessions_are_isolated() {
        let (manager, _) = manager_with(
            vec![ToolCard::new("a", "alpha_tool").with_description("performs alpha duties")],
            WorkingSetConfig::default(),
        );
        manager.update(&update_input("s1", "alpha", 1_500));
        assert!(manager.get("s2").entries.is_empty());
        manager.reset("s1");
        assert!(manager.get("s1").entries.is_empty());
    }

    #[test]
    fn test_selection_order_pins_first_then_recency() {
        let (manager, clock) = manager_with(
            vec![
                ToolCard::new("a", "alpha_tool").with_description("performs alpha duties"),
                ToolCard::new("b", "beta_tool").with_description("performs beta duties"),
                ToolCard::new("c", "gamma_tool").with_description("performs gamma duties"),
            ],
            WorkingSetConfig::default(),
        );

        manager.update(&update_input("s1", "beta", 10_000));
        clock.advance(10);
        let mut input = update_input("s1", "alpha", 10_000);
        input.pin = vec!["c:gamma_tool".into()];
        let result = manager.update(&input);

        // pinned first, then newest selection, then the older beta entry
        assert_eq!(
            result.selected_tool_ids,
            vec![
                "c:gamma_tool".to_string(),
                "a:alpha_tool".to_string(),
                "b:beta_tool".to_string(),
            ]
        );
    }
}
