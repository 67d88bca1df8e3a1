// ABOUTME: MCP tool definitions and dispatch for run_code and cleanup_resources
// ABOUTME: Tool failures are reported as isError content rather than JSON-RPC errors

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::ToolContext;

pub const RUN_CODE: &str = "run_code";
pub const CLEANUP_RESOURCES: &str = "cleanup_resources";

// MCP Tool Types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsRequest {
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema object describing the arguments
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    pub is_error: Option<bool>,
}

impl CallToolResult {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: None,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: Some(true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolContent {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

// Request types for our tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCodeRequest {
    pub code: String,
    #[serde(default)]
    pub libraries_used: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupRequest {
    pub prefix: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn tools_list(_request: Option<ListToolsRequest>) -> Result<ListToolsResult> {
    let run_code = Tool {
        name: RUN_CODE.to_string(),
        description: Some(
            "Execute a self-contained Python script in an isolated Kubernetes Job and return \
             its combined stdout/stderr. List every third-party package the script imports in \
             libraries_used so it is installed first."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source to execute"
                },
                "libraries_used": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "pip requirement specifiers to install before running"
                }
            },
            "required": ["code", "libraries_used"]
        }),
    };

    let cleanup = Tool {
        name: CLEANUP_RESOURCES.to_string(),
        description: Some(
            "Delete leftover Jobs and ConfigMaps whose names start with a prefix. Use dry_run \
             to list matches without deleting."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "prefix": {
                    "type": "string",
                    "description": "Resource name prefix (defaults to the server's run prefix)"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "Only report what would be deleted"
                }
            },
            "required": []
        }),
    };

    Ok(ListToolsResult {
        tools: vec![run_code, cleanup],
        next_cursor: None,
    })
}

pub async fn tools_call(
    request: Option<CallToolRequest>,
    context: &ToolContext,
) -> Result<CallToolResult> {
    let call_request = request.ok_or_else(|| anyhow!("Missing tool call request"))?;
    tracing::debug!(tool = %call_request.name, "Tool call");

    match call_request.name.as_str() {
        RUN_CODE => {
            let args: RunCodeRequest = match parse_arguments(call_request.arguments) {
                Ok(args) => args,
                Err(message) => return Ok(CallToolResult::error(message)),
            };

            let output = context
                .manager()
                .run(&args.code, &args.libraries_used, &context.default_prefix)
                .await;
            Ok(CallToolResult::text(output))
        }
        CLEANUP_RESOURCES => {
            let args: CleanupRequest = match call_request.arguments {
                None => CleanupRequest::default(),
                arguments => match parse_arguments(arguments) {
                    Ok(args) => args,
                    Err(message) => return Ok(CallToolResult::error(message)),
                },
            };
            let prefix = args
                .prefix
                .unwrap_or_else(|| context.default_prefix.clone());

            match context
                .manager()
                .reap_all_by_prefix(&prefix, args.dry_run)
                .await
            {
                Ok(summary) => Ok(CallToolResult::text(serde_json::to_string_pretty(&summary)?)),
                Err(e) => Ok(CallToolResult::error(e.user_message())),
            }
        }
        unknown => Ok(CallToolResult::error(format!("Unknown tool: {}", unknown))),
    }
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(
    arguments: Option<Value>,
) -> std::result::Result<T, String> {
    let arguments = arguments.ok_or_else(|| "Missing arguments".to_string())?;
    serde_json::from_value(arguments).map_err(|e| format!("Failed to parse arguments: {}", e))
}
