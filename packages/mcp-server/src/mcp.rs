// ABOUTME: MCP protocol types and handlers for lifecycle, ping, resources, and prompts
// ABOUTME: Resources and prompts are advertised but empty; tools live in tools.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

// MCP Protocol Types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    pub roots: Option<ListChanged>,
    pub sampling: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub logging: Option<Value>,
    pub prompts: Option<ListChanged>,
    pub resources: Option<ResourcesCapability>,
    pub tools: Option<ListChanged>,
}

/// Capability flag shared by roots, prompts, and tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChanged {
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    pub subscribe: Option<bool>,
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingLevel {
    pub level: String,
}

// MCP Protocol Handlers
pub async fn initialize(request: Option<InitializeRequest>) -> Result<InitializeResult> {
    if let Some(req) = &request {
        tracing::info!(
            client = %req.client_info.name,
            client_version = %req.client_info.version,
            protocol = %req.protocol_version,
            "Client initialized"
        );
    }

    let response = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            logging: None,
            prompts: Some(ListChanged {
                list_changed: Some(false),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            tools: Some(ListChanged {
                list_changed: Some(false),
            }),
        },
        server_info: ServerInfo {
            name: "kubexec".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };
    Ok(response)
}

pub async fn ping(_request: Option<Value>) -> Result<Value> {
    Ok(json!({}))
}

// The log filter is fixed at startup through RUST_LOG
pub async fn logging_set_level(request: Option<LoggingLevel>) -> Result<Value> {
    if let Some(level) = request {
        tracing::debug!(level = %level.level, "Ignoring logging/setLevel");
    }
    Ok(json!({}))
}

pub async fn resources_list(_request: Option<Value>) -> Result<Value> {
    Ok(json!({
        "resources": [],
        "nextCursor": null
    }))
}

pub async fn resources_read(_request: Option<Value>) -> Result<Value> {
    Ok(json!({
        "contents": []
    }))
}

pub async fn prompts_list(_request: Option<Value>) -> Result<Value> {
    Ok(json!({
        "prompts": [],
        "nextCursor": null
    }))
}

pub async fn prompts_get(_request: Option<Value>) -> Result<Value> {
    Ok(json!({
        "messages": []
    }))
}
