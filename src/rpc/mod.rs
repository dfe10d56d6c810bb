//! JSON-RPC 2.0 binding for the router engine.
//!
//! Requests are dispatched strictly in arrival order; the engine does the
//! rest. Responses are framed through [`crate::reduce::stable`] so identical
//! state produces identical bytes.

pub mod stdio;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::catalog::{CatalogError, ToolCard};
use crate::engine::RouterEngine;
use crate::reduce::{stable, ReducePolicy};
use crate::search::SearchQueryInput;
use crate::workingset::WorkingSetUpdateInput;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_ERROR: i64 = -32000;

#[derive(Debug, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: PARSE_ERROR,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Unknown method '{method}'"),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            code: SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<CatalogError> for RpcError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidCard { .. } => Self::invalid_params(err.to_string()),
            CatalogError::Poisoned => Self::server_error(err.to_string()),
        }
    }
}

/// Method dispatch over one shared engine.
pub struct RpcDispatcher {
    engine: Arc<RouterEngine>,
}

impl RpcDispatcher {
    pub fn new(engine: Arc<RouterEngine>) -> Self {
        Self { engine }
    }

    /// Process one newline-delimited message. Returns the serialized response
    /// line, or `None` when the message was a notification (or a batch of
    /// notifications).
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message)?,
            Err(err) => error_response(Value::Null, &RpcError::parse_error(err.to_string())),
        };
        Some(stable::to_stable_string(&response))
    }

    fn handle_message(&self, message: Value) -> Option<Value> {
        match message {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return Some(error_response(
                        Value::Null,
                        &RpcError::invalid_request("empty batch"),
                    ));
                }
                let responses: Vec<Value> = batch
                    .into_iter()
                    .filter_map(|entry| self.handle_single(entry))
                    .collect();
                (!responses.is_empty()).then(|| Value::Array(responses))
            }
            single => self.handle_single(single),
        }
    }

    /// Dispatch one request object. Notifications (no `id`) run for their
    /// effect and yield no response.
    fn handle_single(&self, message: Value) -> Option<Value> {
        let Value::Object(request) = message else {
            return Some(error_response(
                Value::Null,
                &RpcError::invalid_request("request must be an object"),
            ));
        };

        let id = request.get("id").cloned();
        let result = self.validate_and_dispatch(&request);

        match id {
            Some(id) => Some(match result {
                Ok(value) => success_response(id, value),
                Err(err) => {
                    tracing::debug!(code = err.code, message = %err.message, "request failed");
                    error_response(id, &err)
                }
            }),
            None => {
                if let Err(err) = result {
                    tracing::debug!(
                        code = err.code,
                        message = %err.message,
                        "notification failed"
                    );
                }
                None
            }
        }
    }

    fn validate_and_dispatch(
        &self,
        request: &serde_json::Map<String, Value>,
    ) -> Result<Value, RpcError> {
        if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err(RpcError::invalid_request("jsonrpc must be \"2.0\""));
        }
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_request("method must be a string"))?;
        let params = match request.get("params") {
            None => Value::Object(serde_json::Map::new()),
            Some(params @ Value::Object(_)) => params.clone(),
            Some(_) => return Err(RpcError::invalid_params("params must be an object")),
        };
        self.dispatch(method, params)
    }

    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "catalog.upsertTools" => {
                #[derive(Deserialize)]
                struct Params {
                    tools: Vec<ToolCard>,
                }
                let params: Params = parse_params(params)?;
                let count = self.engine.upsert_tools(params.tools)?;
                Ok(json!({ "count": count }))
            }
            "catalog.removeTools" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    tool_ids: Vec<String>,
                }
                let params: Params = parse_params(params)?;
                let count = self.engine.remove_tools(&params.tool_ids)?;
                Ok(json!({ "count": count }))
            }
            "catalog.reset" => {
                self.engine.reset_catalog()?;
                Ok(json!({}))
            }
            "catalog.stats" => to_result(&self.engine.stats()),
            "search.query" => {
                let input: SearchQueryInput = parse_params(params)?;
                to_result(&self.engine.search(&input))
            }
            "ws.get" => {
                let params: SessionParams = parse_params(params)?;
                to_result(&self.engine.working_set(&params.session_id))
            }
            "ws.update" => {
                let input: WorkingSetUpdateInput = parse_params(params)?;
                to_result(&self.engine.update_working_set(&input))
            }
            "ws.markUsed" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    session_id: String,
                    tool_id: String,
                }
                let params: Params = parse_params(params)?;
                self.engine.mark_used(&params.session_id, &params.tool_id);
                Ok(json!({}))
            }
            "ws.reset" => {
                let params: SessionParams = parse_params(params)?;
                self.engine.reset_working_set(&params.session_id);
                Ok(json!({}))
            }
            "result.reduce" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    #[serde(default)]
                    tool_id: Option<String>,
                    #[serde(default)]
                    raw_result: Value,
                    #[serde(default)]
                    policy: Option<ReducePolicy>,
                }
                let params: Params = parse_params(params)?;
                to_result(&self.engine.reduce_result(
                    params.tool_id.as_deref(),
                    &params.raw_result,
                    params.policy,
                ))
            }
            other => Err(RpcError::method_not_found(other)),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionParams {
    session_id: String,
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|err| RpcError::invalid_params(err.to_string()))
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::server_error(err.to_string()))
}

fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, err: &RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": err.code, "message": err.message }
    })
}
