//! The composed retrieval engine: catalog, search, working set, reducer.

use std::sync::Arc;

use serde_json::Value;

use crate::catalog::{CatalogError, CatalogStats, ToolCard, ToolCatalog};
use crate::config::RouterConfig;
use crate::reduce::{self, ReducePolicy, ReducedToolResult};
use crate::search::{SearchEngine, SearchQueryInput, SearchQueryResult};
use crate::workingset::{
    Clock, SystemClock, WorkingSetManager, WorkingSetState, WorkingSetUpdateInput,
    WorkingSetUpdateResult,
};

/// Facade over the four subsystems. The RPC layer and embedders talk to this
/// type only; the catalog stays authoritative and the search engine tracks it
/// by snapshot version.
pub struct RouterEngine {
    config: RouterConfig,
    catalog: Arc<ToolCatalog>,
    search: Arc<SearchEngine>,
    working_set: WorkingSetManager,
}

impl Default for RouterEngine {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl RouterEngine {
    pub fn new(config: RouterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Engine with an injected clock, for deterministic tests.
    pub fn with_clock(config: RouterConfig, clock: Arc<dyn Clock>) -> Self {
        let catalog = Arc::new(ToolCatalog::new());
        let search = Arc::new(SearchEngine::new(
            Arc::clone(&catalog),
            config.bm25.clone(),
        ));
        let working_set = WorkingSetManager::new(
            config.working_set.clone(),
            Arc::clone(&catalog),
            Arc::clone(&search),
            clock,
        );
        Self {
            config,
            catalog,
            search,
            working_set,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    // catalog surface

    pub fn upsert_tools(&self, tools: Vec<ToolCard>) -> Result<usize, CatalogError> {
        self.catalog.upsert_tools(tools)
    }

    pub fn remove_tools(&self, tool_ids: &[String]) -> Result<usize, CatalogError> {
        self.catalog.remove_tools(tool_ids)
    }

    pub fn reset_catalog(&self) -> Result<(), CatalogError> {
        self.catalog.reset()
    }

    pub fn stats(&self) -> CatalogStats {
        self.catalog.stats()
    }

    pub fn get_tool(&self, tool_id: &str) -> Option<ToolCard> {
        self.catalog.get_tool(tool_id)
    }

    // search surface

    pub fn search(&self, input: &SearchQueryInput) -> SearchQueryResult {
        self.search.query(input)
    }

    // working-set surface

    pub fn working_set(&self, session_id: &str) -> WorkingSetState {
        self.working_set.get(session_id)
    }

    pub fn update_working_set(&self, input: &WorkingSetUpdateInput) -> WorkingSetUpdateResult {
        self.working_set.update(input)
    }

    pub fn mark_used(&self, session_id: &str, tool_id: &str) {
        self.working_set.mark_used(session_id, tool_id);
    }

    pub fn reset_working_set(&self, session_id: &str) {
        self.working_set.reset(session_id);
    }

    // reducer surface

    pub fn reduce_result(
        &self,
        tool_id: Option<&str>,
        raw: &Value,
        policy: Option<ReducePolicy>,
    ) -> ReducedToolResult {
        reduce::reduce(tool_id, raw, &policy.unwrap_or(self.config.reduce))
    }
}
