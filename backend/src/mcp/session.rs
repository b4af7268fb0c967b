//! MCP session management.
//!
//! A session pairs one open SSE stream with its tool set. Sessions live in a
//! [`SessionRegistry`] for exactly as long as their stream is open: the
//! stream owns a [`SessionGuard`], and dropping the guard (peer disconnect or
//! local close) removes the session.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sse_mcp_types::jsonrpc::JSONRPC_VERSION;
use sse_mcp_types::{Claims, JsonRpcMessage};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handler::McpHandler;
use super::tools::ToolSet;

/// Outbound buffer per session before senders start waiting.
const OUTBOUND_BUFFER: usize = 100;

/// Events sent to the client over the session's SSE stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A serialized JSON-RPC message.
    Message(String),
}

/// Why a posted message could not be delivered to a session.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Session stream is closed")]
    Closed,
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An open MCP session.
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// Claims of the credential that opened the session.
    pub owner: Claims,
    /// Tools registered at creation.
    pub tools: ToolSet,
    /// When the session was opened.
    pub opened_at: DateTime<Utc>,
    outbound: mpsc::Sender<SessionEvent>,
    closer: CancellationToken,
}

impl Session {
    /// Create a session and the receiving half of its outbound stream.
    pub fn open(owner: Claims, tools: ToolSet) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let session = Self {
            id: Uuid::new_v4().to_string(),
            owner,
            tools,
            opened_at: Utc::now(),
            outbound,
            closer: CancellationToken::new(),
        };
        (session, rx)
    }

    /// Path the client posts messages to, announced in the `endpoint` event.
    pub fn endpoint(&self) -> String {
        format!("/message?sessionId={}", self.id)
    }

    /// Ask the stream to end. The registry entry is removed once it has.
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled() || self.outbound.is_closed()
    }

    /// Resolves once [`Session::close`] has been called.
    pub fn closed(&self) -> WaitForCancellationFutureOwned {
        self.closer.clone().cancelled_owned()
    }

    /// Get the session age in seconds.
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.opened_at).num_seconds()
    }

    /// Push an event onto the session's stream.
    pub async fn send(&self, event: SessionEvent) -> Result<(), DeliveryError> {
        if self.closer.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        self.outbound
            .send(event)
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Decode a posted HTTP body and deliver it.
    pub async fn handle_post_message(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<(), DeliveryError> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if !mime.eq_ignore_ascii_case("application/json") {
            return Err(DeliveryError::UnsupportedContentType(mime.to_string()));
        }

        let message: JsonRpcMessage = serde_json::from_slice(body)
            .map_err(|e| DeliveryError::InvalidMessage(e.to_string()))?;
        if message.version() != JSONRPC_VERSION {
            return Err(DeliveryError::InvalidMessage(format!(
                "unsupported jsonrpc version {:?}",
                message.version()
            )));
        }
        if let JsonRpcMessage::Response(ref response) = message {
            if !response.is_well_formed() {
                return Err(DeliveryError::InvalidMessage(
                    "not a JSON-RPC request, notification or response".to_string(),
                ));
            }
        }

        self.deliver(message).await
    }

    /// Dispatch a decoded message and frame any response onto the stream.
    pub async fn deliver(&self, message: JsonRpcMessage) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }

        let request = match message {
            JsonRpcMessage::Request(request) => request,
            JsonRpcMessage::Response(response) => {
                debug!(
                    "MCP session {}: ignoring client response {:?}",
                    self.id, response.id
                );
                return Ok(());
            }
        };

        if let Some(response) = McpHandler::handle_request(&self.tools, request).await {
            let json = serde_json::to_string(&response)?;
            self.send(SessionEvent::Message(json)).await?;
        }
        Ok(())
    }
}

/// Errors from registry mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session {0} is already registered")]
    DuplicateSession(String),
}

/// The set of currently open sessions, indexed by identifier.
///
/// All operations take the lock once and never hold it across an await, so
/// insert, remove and lookup are atomic with respect to each other.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open session.
    pub fn insert(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.id) {
            return Err(RegistryError::DuplicateSession(session.id.clone()));
        }
        info!(
            "Opened MCP session {} for {} (scope: {})",
            session.id, session.owner.username, session.owner.scope
        );
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Remove `session` if it is still the entry registered under its id.
    ///
    /// Removing an absent or replaced session is a no-op and returns `false`.
    pub fn remove_if(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(&session.id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&session.id);
                info!(
                    "Closed MCP session {} (age: {}s)",
                    session.id,
                    session.age_secs()
                );
                true
            }
            Some(_) => {
                warn!("MCP session {} was replaced before removal", session.id);
                false
            }
            None => {
                debug!("MCP session {} already removed", session.id);
                false
            }
        }
    }

    /// Look up an open session.
    pub fn find_by_id(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Get the number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Ask every open session to close. Returns how many were signalled.
    pub fn close_all(&self) -> usize {
        let sessions = self.sessions.read();
        for session in sessions.values() {
            session.close();
        }
        sessions.len()
    }
}

/// Removes a session from its registry when dropped.
///
/// Owned by the session's SSE stream, so the entry disappears whenever the
/// stream is torn down, whichever side ends it.
pub struct SessionGuard {
    registry: SessionRegistry,
    session: Arc<Session>,
}

impl SessionGuard {
    pub fn new(registry: SessionRegistry, session: Arc<Session>) -> Self {
        Self { registry, session }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
        self.registry.remove_if(&self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sse_mcp_types::JsonRpcRequest;

    fn claims(username: &str) -> Claims {
        Claims {
            username: username.to_string(),
            scope: "mcp:access".to_string(),
            iat: 0,
            exp: u64::MAX,
            iss: sse_mcp_types::DEFAULT_ISSUER.to_string(),
        }
    }

    fn open(username: &str) -> (Arc<Session>, mpsc::Receiver<SessionEvent>) {
        let (session, rx) = Session::open(claims(username), ToolSet::builtin());
        (Arc::new(session), rx)
    }

    fn message_text(event: SessionEvent) -> serde_json::Value {
        let SessionEvent::Message(json) = event;
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_insert_find_remove() {
        let registry = SessionRegistry::new();
        let (session, _rx) = open("alice");
        let id = session.id.clone();

        registry.insert(session).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_id(&id).is_some());

        let found = registry.find_by_id(&id).unwrap();
        assert!(registry.remove_if(&found));
        assert!(registry.find_by_id(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_double_remove_is_noop() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = open("alice");
        let (second, _rx2) = open("bob");
        registry.insert(first.clone()).unwrap();
        registry.insert(second.clone()).unwrap();

        assert!(registry.remove_if(&first));
        assert!(!registry.remove_if(&first));
        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_id(&second.id).is_some());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let registry = SessionRegistry::new();
        let (session, _rx) = open("alice");
        registry.insert(session.clone()).unwrap();

        assert_eq!(
            registry.insert(session.clone()).unwrap_err(),
            RegistryError::DuplicateSession(session.id.clone())
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let (a, _ra) = open("alice");
        let (b, _rb) = open("alice");
        assert_ne!(a.id, b.id);
        assert_eq!(a.endpoint(), format!("/message?sessionId={}", a.id));
    }

    #[test]
    fn test_guard_removes_only_its_session() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = open("alice");
        let (second, _rx2) = open("bob");
        registry.insert(first.clone()).unwrap();
        registry.insert(second.clone()).unwrap();

        let guard = SessionGuard::new(registry.clone(), first.clone());
        drop(guard);

        assert!(first.is_closed());
        assert!(registry.find_by_id(&first.id).is_none());
        assert!(registry.find_by_id(&second.id).is_some());
    }

    #[test]
    fn test_guard_after_manual_remove_is_noop() {
        let registry = SessionRegistry::new();
        let (session, _rx) = open("alice");
        registry.insert(session.clone()).unwrap();
        let guard = SessionGuard::new(registry.clone(), session.clone());

        assert!(registry.remove_if(&session));
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_all_signals_every_session() {
        let registry = SessionRegistry::new();
        let (a, _ra) = open("alice");
        let (b, _rb) = open("bob");
        registry.insert(a.clone()).unwrap();
        registry.insert(b.clone()).unwrap();

        assert_eq!(registry.close_all(), 2);
        assert!(a.is_closed());
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn test_post_message_routes_response_to_stream() {
        let (session, mut rx) = open("alice");
        let body = serde_json::to_vec(&JsonRpcRequest::new(
            1,
            "tools/call",
            Some(json!({ "name": "echo", "arguments": { "message": "hi" } })),
        ))
        .unwrap();

        session
            .handle_post_message(Some("application/json; charset=utf-8"), &body)
            .await
            .unwrap();

        let response = message_text(rx.recv().await.unwrap());
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["content"][0]["text"], "Echo: hi");
    }

    #[tokio::test]
    async fn test_notification_produces_no_event() {
        let (session, mut rx) = open("alice");
        let body = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;

        session
            .handle_post_message(Some("application/json"), body)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_post_message_rejects_bad_input() {
        let (session, _rx) = open("alice");

        let err = session
            .handle_post_message(Some("text/plain"), b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::UnsupportedContentType(_)));

        let err = session
            .handle_post_message(None, b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::UnsupportedContentType(_)));

        let err = session
            .handle_post_message(Some("application/json"), b"not json")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidMessage(_)));

        let err = session
            .handle_post_message(
                Some("application/json"),
                br#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidMessage(_)));

        for body in [
            r#"{"jsonrpc":"2.0"}"#,
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":7}"#,
        ] {
            let err = session
                .handle_post_message(Some("application/json"), body.as_bytes())
                .await
                .unwrap_err();
            assert!(
                matches!(err, DeliveryError::InvalidMessage(_)),
                "accepted {}",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_client_response_is_accepted_silently() {
        let (session, mut rx) = open("alice");
        let body = br#"{"jsonrpc":"2.0","id":"srv-1","result":{}}"#;

        session
            .handle_post_message(Some("application/json"), body)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delivery_to_closed_stream_fails() {
        let (session, rx) = open("alice");
        drop(rx);

        let err = session
            .deliver(JsonRpcMessage::Request(JsonRpcRequest::new(1, "ping", None)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Closed));
    }
}
