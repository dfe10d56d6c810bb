//! Engine-wide configuration with environment overrides.

use crate::reduce::ReducePolicy;
use crate::search::Bm25Params;
use crate::workingset::WorkingSetConfig;

/// Defaults for every subsystem the engine composes. Environment variables
/// only override the session-facing knobs; ranking and reduction parameters
/// are code-level configuration.
#[derive(Clone, Debug, Default)]
pub struct RouterConfig {
    pub working_set: WorkingSetConfig,
    pub bm25: Bm25Params,
    pub reduce: ReducePolicy,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `ROUTER_BUDGET_TOKENS`, `ROUTER_TOP_K`, `ROUTER_TTL_MS`, and
    /// `ROUTER_MAX_ENTRIES` on top of the defaults. Unparseable values are
    /// ignored with a warning rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_parse::<u64>("ROUTER_BUDGET_TOKENS") {
            config.working_set.default_budget_tokens = value;
        }
        if let Some(value) = env_parse::<usize>("ROUTER_TOP_K") {
            config.bm25.default_top_k = value;
        }
        if let Some(value) = env_parse::<u64>("ROUTER_TTL_MS") {
            config.working_set.default_ttl_ms = value;
        }
        if let Some(value) = env_parse::<usize>("ROUTER_MAX_ENTRIES") {
            config.working_set.max_entries = value;
        }
        config
    }

    pub fn with_default_budget(mut self, budget_tokens: u64) -> Self {
        self.working_set.default_budget_tokens = budget_tokens;
        self
    }

    pub fn with_default_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.working_set.default_ttl_ms = ttl_ms;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.working_set.max_entries = max_entries;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
