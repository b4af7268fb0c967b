//! HTTP API request and response types.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// Token API Types
// ============================================================================

/// Query parameters accepted by `GET /auth/token`.
///
/// Both fields are optional; empty values are treated the same as missing
/// ones and replaced by server-side defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct TokenQuery {
    /// Identity to embed in the credential.
    pub username: Option<String>,
    /// Access scope to embed in the credential.
    pub scope: Option<String>,
}

/// Response of `GET /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TokenResponse {
    /// Signed bearer credential.
    pub token: String,
}

// ============================================================================
// Message API Types
// ============================================================================

/// Query parameters accepted by `POST /message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct MessageQuery {
    /// Identifier announced in the stream's `endpoint` event.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}
