//! Credential issuance endpoint.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use sse_mcp_types::{TokenQuery, TokenResponse, DEFAULT_SCOPE};
use tracing::{error, info};

use crate::state::AppState;

/// Issue a bearer credential.
///
/// Unauthenticated. Missing or empty parameters fall back to the configured
/// default identity and the `mcp:access` scope.
#[utoipa::path(
    get,
    path = "/auth/token",
    tag = "auth",
    params(TokenQuery),
    responses(
        (status = 200, description = "Credential issued", body = TokenResponse),
        (status = 500, description = "Signing failed")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let username =
        non_empty(query.username).unwrap_or_else(|| state.default_username().to_string());
    let scope = non_empty(query.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string());

    info!("Auth token requested for {} (scope: {})", username, scope);

    match state.authority().issue(&username, &scope) {
        Ok(credential) => Ok(Json(TokenResponse {
            token: credential.into_string(),
        })),
        Err(e) => {
            error!("Failed to issue token for {}: {}", username, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
