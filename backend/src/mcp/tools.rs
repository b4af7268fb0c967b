//! Tool definitions exposed over an MCP session.
//!
//! A tool is a name, a description, a JSON Schema describing its input and
//! an async handler. Arguments are validated by deserializing them into the
//! handler's typed parameter struct before any work is done.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sse_mcp_types::{CallToolResult, ToolInfo};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors a tool can report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Arguments did not match the tool's input schema.
    #[error("Invalid arguments: {0}")]
    InvalidParams(String),
    /// The tool ran but could not produce a result.
    #[error("{0}")]
    Failed(String),
}

/// Async callable behind a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError>;
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    /// Descriptor advertised by `tools/list`.
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Run the tool. Missing arguments are treated as an empty object.
    pub async fn invoke(&self, arguments: Option<Value>) -> Result<CallToolResult, ToolError> {
        let arguments = arguments.unwrap_or_else(|| json!({}));
        self.handler.call(arguments).await
    }
}

/// The immutable set of tools registered on a session.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four tools every session exposes.
    pub fn builtin() -> Self {
        Self::new()
            .with(test_tool())
            .with(echo_tool())
            .with(get_time_tool())
            .with(random_number_tool())
    }

    /// Add a tool, replacing any previous tool of the same name.
    pub fn with(mut self, tool: ToolDefinition) -> Self {
        debug!("Registering tool: {}", tool.name);
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Descriptors for all tools, ordered by name.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools.values().map(ToolDefinition::info).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Deserialize tool arguments into the handler's parameter type.
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Parameters of tools that take no input. Unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct NoParams {}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

// ============================================================================
// test
// ============================================================================

struct TestTool;

#[async_trait]
impl ToolHandler for TestTool {
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let NoParams {} = parse_args(arguments)?;
        info!("MCP: Test tool called");
        Ok(CallToolResult::text("Security check successful"))
    }
}

fn test_tool() -> ToolDefinition {
    ToolDefinition::new("test", "Test description", empty_schema(), TestTool)
}

// ============================================================================
// echo
// ============================================================================

#[derive(Debug, Deserialize)]
struct EchoParams {
    message: String,
}

struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let params: EchoParams = parse_args(arguments)?;
        Ok(CallToolResult::text(format!("Echo: {}", params.message)))
    }
}

fn echo_tool() -> ToolDefinition {
    ToolDefinition::new(
        "echo",
        "Echo back a message",
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Message to echo back"
                }
            },
            "required": ["message"]
        }),
        EchoTool,
    )
}

// ============================================================================
// get-time
// ============================================================================

struct GetTimeTool;

#[async_trait]
impl ToolHandler for GetTimeTool {
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let NoParams {} = parse_args(arguments)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Ok(CallToolResult::text(format!(
            "Current server time is: {}",
            now
        )))
    }
}

fn get_time_tool() -> ToolDefinition {
    ToolDefinition::new(
        "get-time",
        "Get current server time",
        empty_schema(),
        GetTimeTool,
    )
}

// ============================================================================
// random-number
// ============================================================================

fn default_max() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
struct RandomNumberParams {
    #[serde(default)]
    min: f64,
    #[serde(default = "default_max")]
    max: f64,
}

struct RandomNumberTool;

#[async_trait]
impl ToolHandler for RandomNumberTool {
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ToolError> {
        let RandomNumberParams { min, max } = parse_args(arguments)?;

        // Integers only: the draw is over [ceil(min), floor(max)].
        let low = min.ceil();
        let high = max.floor();
        // 2^63 itself is not representable as i64.
        let limit = -(i64::MIN as f64);
        if low < -limit || high >= limit {
            return Err(ToolError::InvalidParams(format!(
                "min and max must lie within [{}, {}]",
                i64::MIN,
                i64::MAX
            )));
        }
        if low > high {
            return Err(ToolError::Failed(format!(
                "No integer lies between {} and {}",
                min, max
            )));
        }

        let value = rand::rng().random_range(low as i64..=high as i64);
        Ok(CallToolResult::text(format!(
            "Random number between {} and {}: {}",
            min, max, value
        )))
    }
}

fn random_number_tool() -> ToolDefinition {
    ToolDefinition::new(
        "random-number",
        "Generate a random number",
        json!({
            "type": "object",
            "properties": {
                "min": {
                    "type": "number",
                    "default": 0,
                    "description": "Minimum value"
                },
                "max": {
                    "type": "number",
                    "default": 100,
                    "description": "Maximum value"
                }
            }
        }),
        RandomNumberTool,
    )
}
