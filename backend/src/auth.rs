//! Bearer authentication middleware.
//!
//! Every protected route runs [`auth_middleware`] first. It produces exactly
//! one outcome per request: `401` when no bearer token is presented, `403`
//! when the token does not verify, or the downstream handler with the
//! verified [`Claims`] available as an `Extension<Claims>`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sse_mcp_types::Claims;
use thiserror::Error;
use tracing::{debug, warn};

use crate::credential::CredentialError;
use crate::state::AppState;

/// Authentication failures. Both are terminal for the request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No bearer credential presented")]
    MissingCredential,
    #[error("Credential rejected: {0}")]
    InvalidCredential(#[from] CredentialError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidCredential(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// A missing header, another scheme or an empty token all count as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the request's bearer credential and attach its claims.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = authenticate(&state, request.headers()).inspect_err(|e| {
        warn!(
            "Rejecting {} {}: {}",
            request.method(),
            request.uri().path(),
            e
        );
    })?;

    debug!("Authenticated {} (scope: {})", claims.username, claims.scope);
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Claims, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingCredential)?;
    Ok(state.authority().verify(token)?)
}
