//! MCP JSON-RPC request handler.
//!
//! Decodes protocol methods and dispatches tool calls against a session's
//! tool set.

use serde_json::{json, Value};
use sse_mcp_types::jsonrpc::error_codes::{INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use sse_mcp_types::mcp::{LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
use sse_mcp_types::{CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse};
use tracing::{debug, error, info, warn};

use super::tools::{ToolError, ToolSet};

/// Server name reported during initialization.
pub const SERVER_NAME: &str = "sse-mcp-server";

/// MCP request handler.
pub struct McpHandler;

impl McpHandler {
    /// Handle an MCP JSON-RPC request.
    ///
    /// Returns `None` for notifications, which never receive a response.
    pub async fn handle_request(tools: &ToolSet, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("MCP: Handling method: {}", request.method);

        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" => debug!("MCP: Client finished initialization"),
                "notifications/cancelled" => debug!("MCP: Client cancelled a request"),
                other => debug!("MCP: Ignoring notification: {}", other),
            }
            return None;
        }

        let id = request.id.clone();
        let response = match request.method.as_str() {
            "initialize" => Self::handle_initialize(id, request.params.as_ref()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => Self::handle_list_tools(id, tools),
            "tools/call" => {
                Self::handle_call_tool(id, tools, request.params.unwrap_or(json!({}))).await
            }
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    /// Handle the initialize request.
    ///
    /// The client's requested protocol version is echoed back when supported;
    /// otherwise the latest supported version is offered.
    fn handle_initialize(id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);

        let version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
            Some(v) => {
                warn!(
                    "MCP: Client requested unsupported protocol {}, offering {}",
                    v, LATEST_PROTOCOL_VERSION
                );
                LATEST_PROTOCOL_VERSION
            }
            None => LATEST_PROTOCOL_VERSION,
        };

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": version,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    /// Handle the tools/list request.
    fn handle_list_tools(id: Option<Value>, tools: &ToolSet) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": tools.list() }))
    }

    /// Handle a tools/call request.
    async fn handle_call_tool(id: Option<Value>, tools: &ToolSet, params: Value) -> JsonRpcResponse {
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid tools/call params: {}", e),
                )
            }
        };

        let Some(tool) = tools.get(&params.name) else {
            error!("MCP: Unknown tool: {}", params.name);
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Tool {} not found", params.name),
            );
        };

        info!("MCP: Calling tool '{}'", tool.name);
        let result = match tool.invoke(params.arguments).await {
            Ok(result) => result,
            Err(ToolError::InvalidParams(message)) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid arguments for tool {}: {}", tool.name, message),
                )
            }
            Err(e @ ToolError::Failed(_)) => {
                warn!("MCP: Tool '{}' failed: {}", tool.name, e);
                CallToolResult::error(e.to_string())
            }
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(
                id,
                INTERNAL_ERROR,
                format!("Failed to encode tool result: {}", e),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn handle(method: &str, params: Option<Value>) -> JsonRpcResponse {
        let tools = ToolSet::builtin();
        McpHandler::handle_request(&tools, JsonRpcRequest::new(1, method, params))
            .await
            .expect("requests always get a response")
    }

    #[tokio::test]
    async fn test_initialize_echoes_supported_version() {
        let resp = handle("initialize", Some(json!({ "protocolVersion": "2024-11-05" }))).await;
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_offers_latest_for_unknown_version() {
        let resp = handle("initialize", Some(json!({ "protocolVersion": "1999-01-01" }))).await;
        assert_eq!(
            resp.result.unwrap()["protocolVersion"],
            LATEST_PROTOCOL_VERSION
        );
    }

    #[tokio::test]
    async fn test_ping() {
        let resp = handle("ping", None).await;
        assert_eq!(resp.result, Some(json!({})));
        assert_eq!(resp.id, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_list_tools() {
        let resp = handle("tools/list", None).await;
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 4);
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
    }

    #[tokio::test]
    async fn test_call_echo() {
        let resp = handle(
            "tools/call",
            Some(json!({ "name": "echo", "arguments": { "message": "hi" } })),
        )
        .await;
        assert_eq!(resp.result.unwrap()["content"][0]["text"], "Echo: hi");
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let resp = handle("tools/call", Some(json!({ "name": "nope" }))).await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_call_with_invalid_arguments() {
        let resp = handle(
            "tools/call",
            Some(json!({ "name": "echo", "arguments": { "message": 1 } })),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_failure_is_content() {
        let resp = handle(
            "tools/call",
            Some(json!({ "name": "random-number", "arguments": { "min": 9, "max": 1 } })),
        )
        .await;
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = handle("resources/list", None).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let tools = ToolSet::builtin();
        let note = JsonRpcRequest::notification("notifications/initialized", None);
        assert!(McpHandler::handle_request(&tools, note).await.is_none());
    }
}
