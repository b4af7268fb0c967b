//! MCP (Model Context Protocol) over the HTTP+SSE transport.
//!
//! A client opens a Server-Sent Events stream and receives an `endpoint`
//! event naming the URL to post JSON-RPC messages to. Responses to those
//! messages come back on the stream as `message` events.
//!
//! ## Endpoints
//!
//! - `GET /sse` - Open the stream and create a session
//! - `POST /message?sessionId=<id>` - Send a JSON-RPC message to a session
//!
//! ## Session Management
//!
//! Sessions are identified by random UUIDs and exist exactly as long as
//! their stream is open.

pub mod handler;
pub mod session;
pub mod tools;

pub use handler::McpHandler;
pub use session::{DeliveryError, Session, SessionEvent, SessionGuard, SessionRegistry};
pub use tools::{ToolDefinition, ToolError, ToolHandler, ToolSet};
