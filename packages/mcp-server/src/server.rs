// ABOUTME: Line-delimited JSON-RPC loop serving MCP requests concurrently
// ABOUTME: Each request runs on its own task; a single writer task serializes responses

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::ToolContext;
use crate::mcp::*;
use crate::tools::{tools_call, tools_list};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Unknown method: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RpcError {
    fn code(&self) -> i64 {
        match self {
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
            RpcError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<Option<T>, RpcError> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(RpcError::InvalidParams)
}

fn to_result<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Internal(e.into()))
}

pub async fn handle_rpc_request(
    method: &str,
    params: Option<Value>,
    context: &ToolContext,
) -> Result<Value, RpcError> {
    let result = match method {
        "initialize" => to_result(initialize(parse_params(params)?).await?)?,
        "ping" => ping(params).await?,
        "logging/setLevel" => logging_set_level(parse_params(params)?).await?,
        "resources/list" => resources_list(params).await?,
        "resources/read" => resources_read(params).await?,
        "prompts/list" => prompts_list(params).await?,
        "prompts/get" => prompts_get(params).await?,
        "tools/list" => to_result(tools_list(parse_params(params)?).await?)?,
        "tools/call" => to_result(tools_call(parse_params(params)?, context).await?)?,
        other => return Err(RpcError::MethodNotFound(other.to_string())),
    };
    Ok(result)
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Handle one line of input; `None` means no response is due (notifications)
pub async fn handle_message(line: &str, context: &ToolContext) -> Option<Value> {
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparseable request");
            return Some(error_response(Value::Null, PARSE_ERROR, e.to_string()));
        }
    };

    let id = request.get("id").cloned();
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return id.map(|id| {
            error_response(id, INVALID_REQUEST, "Request has no method".to_string())
        });
    };

    // Notifications don't require responses
    let Some(id) = id.filter(|_| !method.starts_with("notifications/")) else {
        debug!(method, "Notification received");
        return None;
    };

    let params = request.get("params").cloned();
    match handle_rpc_request(method, params, context).await {
        Ok(result) => Some(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        })),
        Err(e) => {
            warn!(method, error = %e, "Request failed");
            Some(error_response(id, e.code(), e.to_string()))
        }
    }
}

/// Serve requests from `reader` until EOF or `shutdown` resolves.
///
/// Requests already in flight are allowed to finish so their runs get
/// cleaned up before this returns.
pub async fn serve<R, W, S>(reader: R, writer: W, context: ToolContext, shutdown: S) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_vec(&response)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            writer.flush().await?;
        }
        Ok::<_, anyhow::Error>(())
    });

    let mut lines = reader.lines();
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let context = context.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    if let Some(response) = handle_message(&line, &context).await {
                        // Receiver only goes away once every sender is dropped
                        let _ = tx.send(response);
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Request task panicked");
                }
            }
        }
    }

    if !in_flight.is_empty() {
        info!(count = in_flight.len(), "Waiting for in-flight requests");
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Request task panicked");
        }
    }

    drop(tx);
    writer_task.await??;
    Ok(())
}
