//! Server-Sent Events endpoint that opens MCP sessions.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{self, Stream, StreamExt};
use sse_mcp_types::Claims;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::mcp::{Session, SessionEvent, SessionGuard, ToolSet};
use crate::state::AppState;

/// Interval between keep-alive comments on an idle stream.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Open an MCP session.
///
/// The first event is `endpoint`, whose data is the URL to post messages
/// to. Every JSON-RPC response for the session follows as a `message` event.
/// The session is registered for as long as this stream is open.
#[utoipa::path(
    get,
    path = "/sse",
    tag = "mcp",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Event stream opened", content_type = "text/event-stream"),
        (status = 401, description = "No bearer credential"),
        (status = 403, description = "Credential invalid or expired")
    )
)]
pub async fn open_stream(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let (session, rx) = Session::open(claims, ToolSet::builtin());
    let session = Arc::new(session);

    if let Err(e) = state.sessions().insert(session.clone()) {
        error!("Failed to register MCP session: {}", e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    info!(
        "SSE stream opened for session {} ({} tools, {} open sessions)",
        session.id,
        session.tools.len(),
        state.sessions().len()
    );

    Ok(Sse::new(session_stream(state, session, rx))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// Build the event stream for a registered session.
///
/// The stream owns the session's guard, so the registry entry goes away
/// when the stream is dropped by the transport or ends after a local close.
fn session_stream(
    state: AppState,
    session: Arc<Session>,
    rx: tokio::sync::mpsc::Receiver<SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let endpoint = Event::default().event("endpoint").data(session.endpoint());
    let closed = session.closed();
    let guard = SessionGuard::new(state.sessions().clone(), session);

    let messages = ReceiverStream::new(rx).map(|event| match event {
        SessionEvent::Message(json) => {
            Ok::<_, Infallible>(Event::default().event("message").data(json))
        }
    });

    stream::once(async move { Ok::<_, Infallible>(endpoint) })
        .chain(messages)
        .take_until(closed)
        .map(move |event| {
            let _guard = &guard;
            event
        })
}
