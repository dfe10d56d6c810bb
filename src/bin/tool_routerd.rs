//! tool-routerd: JSON-RPC stdio daemon around the router engine.
//!
//! Reads one JSON-RPC 2.0 message per line from stdin and writes one response
//! per request to stdout. Logs go to stderr; set `ROUTERD_LOG` (or
//! `RUST_LOG`) to adjust verbosity.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tool_router::{rpc, RouterConfig, RouterEngine};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_env("ROUTERD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = RouterConfig::from_env();
    tracing::info!(
        budget = config.working_set.default_budget_tokens,
        top_k = config.bm25.default_top_k,
        ttl_ms = config.working_set.default_ttl_ms,
        "tool-routerd starting"
    );

    let engine = Arc::new(RouterEngine::new(config));
    rpc::stdio::serve(engine).await
}
