//! HTTP transports: stateless request/response and SSE with a message endpoint.
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /mcp` | one JSON-RPC call in, one reply out |
//! | `GET /sse` | opens an event stream and a session |
//! | `POST /messages?sessionId=..` | feeds a message into an open session |
//! | `GET /health` | liveness |

use async_stream::stream;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::protocol::{self, McpHandler, INTERNAL_ERROR, PARSE_ERROR, SERVER_ERROR};
use super::session::SessionTable;
use super::tools::ToolRegistry;

pub const MCP_PATH: &str = "/mcp";
pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";
pub const HEALTH_PATH: &str = "/health";

/// State shared by every route
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub sessions: SessionTable,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
}

/// Build the router for both transports
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            MCP_PATH,
            post(mcp_post).get(method_not_allowed).delete(method_not_allowed),
        )
        .route(SSE_PATH, get(sse_open))
        .route(MESSAGES_PATH, post(sse_message))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

/// Stateless call: a fresh handler per request, nothing kept afterwards.
///
/// Dispatch runs on its own task, so a client that goes away mid-call only
/// loses the reply; backend calls already started run to completion.
async fn mcp_post(State(state): State<AppState>, body: Bytes) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(protocol::error_body(PARSE_ERROR, format!("Parse error: {}", e))),
            )
                .into_response()
        }
    };

    let handler = McpHandler::new(Arc::clone(&state.registry));
    let outcome = tokio::spawn(async move { handler.handle(message).await }).await;

    let failure = match outcome {
        Ok(Ok(Some(reply))) => return (StatusCode::OK, Json(reply)).into_response(),
        Ok(Ok(None)) => return StatusCode::ACCEPTED.into_response(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("Request task failed: {}", e),
    };

    tracing::error!("Error handling MCP request: {}", failure);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(protocol::error_body(INTERNAL_ERROR, failure)),
    )
        .into_response()
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(protocol::error_body(SERVER_ERROR, "Method not allowed.")),
    )
        .into_response()
}

/// Open an event stream; the first event tells the client where to post.
///
/// Messages are dispatched by a per-session worker task, one at a time in
/// arrival order. The stream only relays replies, so dropping it closes the
/// session without cancelling a call the worker has already started.
async fn sse_open(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (guard, inbound) = state.sessions.open();
    let (outbound_tx, mut outbound) = mpsc::unbounded_channel();
    let handler = McpHandler::new(Arc::clone(&state.registry));
    let endpoint = format!("{}?sessionId={}", MESSAGES_PATH, guard.id());

    tracing::info!(session_id = %guard.id(), "SSE session opened");
    tokio::spawn(session_worker(
        guard.id().to_string(),
        handler,
        inbound,
        outbound_tx,
    ));

    let events = stream! {
        let _session = guard;
        yield Ok::<Event, Infallible>(Event::default().event("endpoint").data(endpoint));

        while let Some(reply) = outbound.recv().await {
            yield Ok(Event::default().event("message").data(reply.to_string()));
        }
    };

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

/// Drain a session's inbound queue until the session is closed
async fn session_worker(
    session_id: String,
    handler: McpHandler,
    mut inbound: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Value>,
) {
    while let Some(message) = inbound.recv().await {
        let reply = match handler.handle(message).await {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(session_id = %session_id, "Error handling MCP message: {}", e);
                protocol::error_body(INTERNAL_ERROR, e.to_string())
            }
        };
        if outbound.send(reply).is_err() {
            tracing::debug!(session_id = %session_id, "Reply dropped; stream already closed");
        }
    }
    tracing::debug!(session_id = %session_id, "Session worker finished");
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

fn unknown_session() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Unknown session" })),
    )
        .into_response()
}

/// Route a client message into its session; the reply arrives on the stream.
async fn sse_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| state.sessions.contains(id)) else {
        tracing::debug!("Message for unknown session rejected");
        return unknown_session();
    };

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(protocol::error_body(PARSE_ERROR, format!("Parse error: {}", e))),
            )
                .into_response()
        }
    };

    match state.sessions.forward(&session_id, message) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(_) => unknown_session(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": protocol::SERVER_NAME,
        "version": protocol::SERVER_VERSION,
    }))
}
