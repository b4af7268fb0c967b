//! Shared types for the SSE MCP server.
//!
//! This crate contains the wire formats spoken by the server: the token
//! endpoint payloads, credential claims, JSON-RPC 2.0 envelopes and the MCP
//! tool descriptors carried inside them.

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 3001;

/// Issuer tag embedded in every credential.
pub const DEFAULT_ISSUER: &str = "SSE MCP SERVER";

/// Scope granted when the token request does not name one.
pub const DEFAULT_SCOPE: &str = "mcp:access";

pub mod api;
pub mod auth;
pub mod jsonrpc;
pub mod mcp;

// Re-export commonly used types
pub use api::{MessageQuery, TokenQuery, TokenResponse};
pub use auth::Claims;
pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
pub use mcp::{CallToolParams, CallToolResult, Content, ToolInfo};
