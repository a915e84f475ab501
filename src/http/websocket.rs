//! WebSocket dispatch endpoint.
//!
//! # Responsibilities
//! - Accept the upgrade and resolve the client's session once
//! - Read verb-named events (`get`, `post`, ...) off the socket
//! - Synthesize a request per event and run it through the same engine
//! - Reply with the finalized plan; let handlers push extra frames
//!
//! # Data Flow
//! ```text
//! {"event":"post","path":"/notes","body":{...}}
//!     → synthesized RequestInfo (method = event, transport = websocket)
//!     → engine::dispatch_socket
//!     → {"event":"post","path":"/notes","status":200,"fields":{...}}
//! ```

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::app::App;
use crate::engine::executor::{self, Completion};
use crate::engine::state::RouterState;
use crate::http::request::{RequestInfo, Transport};
use crate::http::server::{persist_session, AppState};
use crate::observability::metrics;

/// One inbound socket event.
#[derive(Debug, Deserialize)]
struct SocketEvent {
    event: String,
    path: String,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    params: Option<Value>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let app = state.app.clone();

    // Session is resolved once, at upgrade time.
    let cookie = headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let session = app
        .sessions
        .lookup(cookie.as_deref(), &app.config.session.cookie_name);

    ws.on_upgrade(move |socket| handle_socket(app, socket, session))
}

async fn handle_socket(
    app: Arc<App>,
    socket: WebSocket,
    session: Option<(String, crate::http::session::SessionData)>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Outbound frames: replies and handler pushes share one channel.
    let forward = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let event: SocketEvent = match serde_json::from_str(text.as_str()) {
                    Ok(event) => event,
                    Err(error) => {
                        warn!(error = %error, "unparseable socket event");
                        let reply = json!({"status": 400, "error": "malformed event"});
                        if tx.send(reply.to_string()).is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let reply = dispatch_event(&app, &event, &session, tx.clone()).await;
                if tx.send(reply.to_string()).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Ping/pong are answered by axum itself.
            _ => {}
        }
    }

    drop(tx);
    let _ = forward.await;
    debug!("socket connection closed");
}

/// Run one event through the engine and shape the reply frame.
async fn dispatch_event(
    app: &App,
    event: &SocketEvent,
    session: &Option<(String, crate::http::session::SessionData)>,
    sender: crate::engine::state::SocketSender,
) -> Value {
    let mut info = RequestInfo::new(&event.event, &event.path)
        .with_transport(Transport::Websocket);
    if let Some(body) = &event.body {
        info = info.with_body(body.clone());
    }
    if let Some((id, data)) = session {
        info = info
            .with_session(id.clone(), data.values.clone())
            .with_authenticated(data.authenticated);
    }

    let extra = event.params.clone();
    let request = Arc::new(info);
    let (state, completion) =
        executor::dispatch_socket(app, request, sender, extra.as_ref()).await;

    let reply = reply_frame(app, &state, completion, event).await;
    metrics::record_socket_event(&event.event, state.status());
    reply
}

async fn reply_frame(
    app: &App,
    state: &RouterState,
    completion: Completion,
    event: &SocketEvent,
) -> Value {
    match completion {
        Completion::Sent => {
            persist_session(app, state);
            let plan = state.response_plan();
            state.mark_sent();
            if let Some(target) = plan.redirect_target {
                json!({
                    "event": event.event,
                    "path": event.path,
                    "status": 302,
                    "redirect": target,
                })
            } else {
                json!({
                    "event": event.event,
                    "path": event.path,
                    "status": plan.status,
                    "fields": Value::Object(plan.send_fields),
                })
            }
        }
        Completion::Fallthrough => {
            let status = if state.status() >= 400 { state.status() } else { 404 };
            let error_completion = executor::dispatch_error(app, state, status).await;
            persist_session(app, state);
            match error_completion {
                Completion::Sent => {
                    let plan = state.response_plan();
                    state.mark_sent();
                    json!({
                        "event": event.event,
                        "path": event.path,
                        "status": plan.status,
                        "fields": Value::Object(plan.send_fields),
                    })
                }
                Completion::Fallthrough => json!({
                    "event": event.event,
                    "path": event.path,
                    "status": status,
                }),
            }
        }
    }
}
