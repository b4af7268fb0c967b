//! Message endpoint that routes posted JSON-RPC messages to sessions.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use sse_mcp_types::{Claims, MessageQuery};
use thiserror::Error;
use tracing::{debug, warn};

use crate::mcp::DeliveryError;
use crate::state::AppState;

/// Largest message body accepted.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// Routing failures for posted messages.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Session not found")]
    UnknownSession,
    #[error(transparent)]
    Delivery(DeliveryError),
}

impl From<DeliveryError> for RouteError {
    fn from(e: DeliveryError) -> Self {
        match e {
            // The stream closed between lookup and delivery.
            DeliveryError::Closed => Self::UnknownSession,
            other => Self::Delivery(other),
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownSession => StatusCode::NOT_FOUND,
            Self::Delivery(DeliveryError::UnsupportedContentType(_))
            | Self::Delivery(DeliveryError::InvalidMessage(_)) => StatusCode::BAD_REQUEST,
            Self::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Route a JSON-RPC message to an open session.
///
/// The response to the message is delivered on the session's event stream;
/// this endpoint only acknowledges receipt.
#[utoipa::path(
    post,
    path = "/message",
    tag = "mcp",
    security(("bearer" = [])),
    params(MessageQuery),
    request_body(content = String, content_type = "application/json", description = "JSON-RPC 2.0 message"),
    responses(
        (status = 202, description = "Message accepted"),
        (status = 400, description = "Unsupported content type or malformed message"),
        (status = 401, description = "No bearer credential"),
        (status = 403, description = "Credential invalid or expired"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn post_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), RouteError> {
    let session_id = query.session_id.unwrap_or_default();
    debug!(
        "Received message from {} for session {:?}",
        claims.username, session_id
    );

    let Some(session) = state.sessions().find_by_id(&session_id) else {
        warn!("Message for unknown session {:?}", session_id);
        return Err(RouteError::UnknownSession);
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    session.handle_post_message(content_type, &body).await?;

    Ok((StatusCode::ACCEPTED, "Accepted"))
}
