//! # tool-router
//!
//! Retrieval and session engine for routing MCP tool invocations to an LLM
//! agent. Instead of streaming every tool definition on every turn, the
//! router keeps a searchable catalog of tools, selects a budget-respecting
//! working set per session, and deterministically compresses tool results.
//!
//! Four subsystems compose into one engine:
//!
//! - [`catalog`] — authoritative ToolCard store with versioned snapshots
//! - [`search`] — field-weighted BM25 ranking plus a regex mode
//! - [`workingset`] — per-session selection with pins, TTLs, and a token budget
//! - [`reduce`] — byte-capped reduction of arbitrary tool output
//!
//! The `tool-routerd` binary wraps the engine in JSON-RPC 2.0 over
//! newline-delimited stdio; embedders can use [`RouterEngine`] directly.
//!
//! ## Quick Start
//!
//! ```
//! use tool_router::{RouterConfig, RouterEngine, SearchQueryInput, ToolCard};
//!
//! let engine = RouterEngine::new(RouterConfig::default());
//! engine.upsert_tools(vec![
//!     ToolCard::new("slack", "post_message").with_description("Send a chat message"),
//! ])?;
//!
//! let result = engine.search(&SearchQueryInput::new("post a message"));
//! assert_eq!(result.hits[0].tool_id, "slack:post_message");
//! # Ok::<(), tool_router::Error>(())
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod reduce;
pub mod rpc;
pub mod search;
pub mod text;
pub mod workingset;

pub use catalog::{
    split_tool_id, CatalogError, CatalogSnapshot, CatalogStats, CostHint, SearchField, SideEffect,
    ToolArg, ToolCard, ToolCatalog, ToolExample, ToolSearchDoc,
};
pub use config::RouterConfig;
pub use engine::RouterEngine;
pub use reduce::{reduce, ReducePolicy, ReducedToolResult};
pub use search::{
    Bm25Params, CandidateCounts, FieldWeights, SearchEngine, SearchFilters, SearchHit, SearchMode,
    SearchQueryInput, SearchQueryResult,
};
pub use workingset::{
    estimate_tool_tokens, Clock, ManualClock, SystemClock, WorkingSetConfig, WorkingSetEntry,
    WorkingSetManager, WorkingSetState, WorkingSetUpdateInput, WorkingSetUpdateResult,
};

/// Error type for router operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Catalog rejected the input or its lock was poisoned.
    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON-RPC request could not be served.
    #[error("{0}")]
    Rpc(#[from] rpc::RpcError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_from_catalog() {
        let err: Error = CatalogError::InvalidCard {
            reason: "toolId is required".into(),
        }
        .into();
        assert!(matches!(err, Error::Catalog(_)));
        assert!(err.to_string().contains("toolId"));
    }

    #[test]
    fn test_error_conversion_from_rpc() {
        let err: Error = rpc::RpcError::method_not_found("x.y").into();
        assert!(err.to_string().contains("x.y"));
    }
}
