//! JSON-RPC 2.0 framing and MCP method dispatch.
//!
//! [`McpHandler`] is transport-agnostic: it takes one decoded message and
//! returns the reply, or `None` for notifications. The HTTP and SSE endpoints
//! both feed it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::envelope::Envelope;
use super::tools::ToolRegistry;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SERVER_ERROR: i32 = -32000;

/// Protocol revisions this server can speak, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "sheets-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Error body with a null id, for failures that happen outside dispatch
pub fn error_body(code: i32, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "error": {
            "code": code,
            "message": message.into(),
        },
        "id": null,
    })
}

/// Failures of the dispatcher itself, as opposed to failing tools
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Dispatches MCP requests against the shared tool registry
#[derive(Debug, Clone)]
pub struct McpHandler {
    registry: Arc<ToolRegistry>,
}

impl McpHandler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one message; `Ok(None)` means no reply is due
    pub async fn handle(&self, message: Value) -> Result<Option<Value>, ProtocolError> {
        let raw_id = message.get("id").cloned().unwrap_or(Value::Null);

        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return encode(JsonRpcResponse::error(
                    raw_id,
                    INVALID_REQUEST,
                    format!("Invalid Request: {}", e),
                ))
                .map(Some)
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return encode(JsonRpcResponse::error(
                raw_id,
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            ))
            .map(Some);
        }

        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Notification received");
            return Ok(None);
        };

        tracing::debug!(method = %request.method, "Request received");
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result(request.params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": self.registry.descriptors() }),
            ),
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        };

        encode(response).map(Some)
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned();

        match self.registry.execute(name, arguments).await {
            Ok(envelope) => respond_with(id, &envelope),
            Err(e) if e.is_invalid_params() => JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()),
            Err(e) => {
                tracing::warn!(tool = name, "Tool call failed: {}", e);
                respond_with(id, &Envelope::error(e.to_string()))
            }
        }
    }
}

fn respond_with(id: Value, envelope: &Envelope) -> JsonRpcResponse {
    match serde_json::to_value(envelope) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

fn encode(response: JsonRpcResponse) -> Result<Value, ProtocolError> {
    serde_json::to_value(response).map_err(|e| ProtocolError::Internal(e.to_string()))
}

fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);

    let version = requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

    json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::MockBackend;

    fn handler(folder: Option<&str>) -> (Arc<MockBackend>, McpHandler) {
        let backend = Arc::new(MockBackend::new());
        let registry = ToolRegistry::new(backend.clone(), folder.map(str::to_string));
        (backend, McpHandler::new(Arc::new(registry)))
    }

    async fn reply(handler: &McpHandler, message: Value) -> Value {
        handler.handle(message).await.unwrap().expect("expected a reply")
    }

    #[tokio::test]
    async fn test_initialize_negotiates_version() {
        let (_, handler) = handler(None);

        let resp = reply(
            &handler,
            json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}),
        )
        .await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(resp["result"]["serverInfo"]["name"], "sheets-mcp");
        assert!(resp["result"]["capabilities"]["tools"].is_object());

        let resp = reply(
            &handler,
            json!({"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}),
        )
        .await;
        assert_eq!(resp["result"]["protocolVersion"], SUPPORTED_PROTOCOL_VERSIONS[0]);
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let (_, handler) = handler(None);
        let out = handler
            .handle(json!({"jsonrpc":"2.0","method":"notifications/initialized"}))
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let (_, handler) = handler(None);
        let resp = reply(&handler, json!({"jsonrpc":"2.0","id":"a","method":"tools/list"})).await;
        assert_eq!(resp["id"], "a");
        assert_eq!(resp["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let (_, handler) = handler(Some("folder-1"));
        let resp = reply(
            &handler,
            json!({
                "jsonrpc":"2.0","id":7,"method":"tools/call",
                "params":{"name":"create_spreadsheet","arguments":{"title":"Report"}}
            }),
        )
        .await;

        assert_eq!(resp["result"]["structuredContent"]["spreadsheetId"], "mock-spreadsheet");
        assert!(resp["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("\"title\": \"Report\""));
        assert!(resp.get("error").is_none());
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_invalid_params() {
        let (backend, handler) = handler(None);
        let resp = reply(
            &handler,
            json!({
                "jsonrpc":"2.0","id":3,"method":"tools/call",
                "params":{"name":"append_rows","arguments":{"spreadsheetId":"x","range":"A1","values":[]}}
            }),
        )
        .await;

        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let (_, handler) = handler(None);
        let resp = reply(
            &handler,
            json!({"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope"}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result() {
        let (_, handler) = handler(None);
        let resp = reply(
            &handler,
            json!({"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"list_spreadsheets"}}),
        )
        .await;

        assert_eq!(resp["result"]["isError"], true);
        assert!(resp["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("DRIVE_FOLDER_ID"));
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        let (_, handler) = handler(None);

        let resp = reply(&handler, json!({"jsonrpc":"1.0","id":1,"method":"ping"})).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);
        assert_eq!(resp["id"], 1);

        let resp = reply(&handler, json!([1, 2])).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);
        assert_eq!(resp["id"], Value::Null);

        let resp = reply(&handler, json!({"jsonrpc":"2.0","id":9,"method":"resources/list"})).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
    }

    #[test]
    fn test_error_body_shape() {
        assert_eq!(
            error_body(INTERNAL_ERROR, "boom"),
            json!({"jsonrpc":"2.0","error":{"code":-32603,"message":"boom"},"id":null})
        );
    }
}
