//! Application state management.

use std::sync::Arc;

use crate::credential::CredentialAuthority;
use crate::mcp::SessionRegistry;

/// Shared application state.
///
/// Holds the collaborators every handler needs. The session registry lives
/// here rather than in a global so tests can build isolated instances.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Issues and verifies bearer credentials
    authority: CredentialAuthority,
    /// Open MCP sessions, indexed by ID
    sessions: SessionRegistry,
    /// Identity used when a token request names none
    default_username: String,
}

impl AppState {
    /// Create application state around a credential authority.
    pub fn new(authority: CredentialAuthority, default_username: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                authority,
                sessions: SessionRegistry::new(),
                default_username: default_username.into(),
            }),
        }
    }

    /// Get the credential authority.
    pub fn authority(&self) -> &CredentialAuthority {
        &self.inner.authority
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Get the identity used for token requests without a username.
    pub fn default_username(&self) -> &str {
        &self.inner.default_username
    }
}
