//! `WebSocket` handlers for data client and observer sessions.
//!
//! Data clients connect to `GET /connect` and send JSON command frames;
//! replies, when a command has one, come back as plain text frames.
//! Observers connect to `GET /admin`: they receive the full store state
//! (`csvSync` then `kvpSync`) before the live event stream, and may issue
//! `download`/`upload` over the same connection.
//!
//! Transport failures are scoped to the connection that hit them: the
//! session ends, the client counter (or observer registry) is updated, and
//! every other session keeps running.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use pegboard_core::processor::Decoded;
use pegboard_core::{admin, processor, DataStore, ObserverHandle};
use pegboard_types::{ClientRequest, Command, EventFrame, ServerFrame};
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a data client session.
///
/// # Route
///
/// `GET /connect`
pub async fn ws_connect(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_client(socket, state))
}

/// Upgrade an HTTP request to an observer session.
///
/// # Route
///
/// `GET /admin`
pub async fn ws_admin(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_admin(socket, state))
}

/// Handle a data client session: count it, process command frames in
/// order, and count it out when the connection ends.
async fn handle_client(mut socket: WebSocket, state: Arc<AppState>) {
    let count = state.store.client_connected();
    debug!(count, "data client connected");

    // Frames that arrived while the session was suspended in a blocking
    // read; processed before the socket is polled again.
    let mut backlog: VecDeque<Utf8Bytes> = VecDeque::new();

    loop {
        let text = if let Some(text) = backlog.pop_front() {
            text
        } else {
            match socket.recv().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(data))) => match text_payload(&data) {
                    Some(text) => text,
                    None => continue,
                },
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(error = %e, "data client socket error");
                    break;
                }
                // Pong frames are ignored.
                Some(Ok(_)) => continue,
            }
        };

        let reply = match processor::decode(text.as_str()) {
            // `get` is the one command that can suspend the session, so it
            // runs concurrently with connection teardown detection.
            Decoded::Command(Command::Get { key }) => {
                match blocking_get(&mut socket, &state.store, &key, &mut backlog).await {
                    Some(reply) => Some(reply),
                    None => break,
                }
            }
            Decoded::Command(command) => processor::dispatch(&state.store, command).await,
            Decoded::Unknown => Some(String::from(processor::UNKNOWN_COMMAND_REPLY)),
            Decoded::Malformed => None,
        };

        if let Some(reply) = reply {
            if socket.send(Message::Text(reply.into())).await.is_err() {
                debug!("data client disconnected (send failed)");
                break;
            }
        }
    }

    let count = state.store.client_disconnected();
    debug!(count, "data client disconnected");
}

/// Drive a blocking read while watching the socket, so a client that
/// disconnects mid-wait cancels its waiter registration instead of leaking
/// it. Command frames arriving during the wait are deferred to `backlog`
/// (the session stays suspended; nothing is lost).
///
/// Returns the reply text, or `None` when the connection ended.
async fn blocking_get(
    socket: &mut WebSocket,
    store: &DataStore,
    key: &str,
    backlog: &mut VecDeque<Utf8Bytes>,
) -> Option<String> {
    let mut get = pin!(store.get(key));
    loop {
        tokio::select! {
            result = &mut get => {
                return Some(match result {
                    Ok(value) => value,
                    Err(e) => format!("Error: {e}"),
                });
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => backlog.push_back(text),
                Some(Ok(Message::Binary(data))) => {
                    if let Some(text) = text_payload(&data) {
                        backlog.push_back(text);
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        return None;
                    }
                }
                // Dropping the in-flight `get` future deregisters its waiter.
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => {
                    debug!(error = %e, "data client socket error during blocking read");
                    return None;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

/// Handle an observer session: register (which syncs the full state before
/// any live event), then forward outbound frames and serve
/// `download`/`upload` until the connection ends.
async fn handle_admin(mut socket: WebSocket, state: Arc<AppState>) {
    let (observer, mut outbound) = ObserverHandle::channel();
    let id = observer.id();
    debug!(%id, "observer connected");
    state.store.register_observer(observer.clone());

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                // The sending half lives in the registry and in `observer`;
                // it outlives this loop, so `frame` is always `Some` here.
                let Some(frame) = frame else { break };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize observer frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!(%id, "observer disconnected (send failed)");
                    break;
                }
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    handle_admin_request(&state, &observer, text.as_str());
                }
                Some(Ok(Message::Binary(data))) => {
                    if let Some(text) = text_payload(&data) {
                        handle_admin_request(&state, &observer, text.as_str());
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%id, "observer disconnected");
                    break;
                }
                Some(Err(e)) => {
                    debug!(%id, error = %e, "observer socket error");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    state.fanout.deregister(id);
}

/// Decode and execute one observer command frame.
///
/// Unknown observer commands are ignored, matching the protocol: the data
/// command set is not available on the observer channel.
fn handle_admin_request(state: &AppState, observer: &ObserverHandle, text: &str) {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "malformed observer request dropped");
            return;
        }
    };

    match request.command.as_str() {
        "download" => {
            let snapshot = admin::download(&state.store);
            let payload = match serde_json::to_string(&snapshot) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "failed to serialize snapshot");
                    return;
                }
            };
            if observer
                .send(ServerFrame::Event(EventFrame::download(payload)))
                .is_err()
            {
                debug!("observer gone before download reply");
            }
        }
        "upload" => admin::upload_text(&state.store, observer, &request.value),
        other => debug!(command = other, "ignored observer command"),
    }
}

/// Reinterpret a binary frame as command text.
///
/// The protocol is JSON either way, so a binary frame that decodes as
/// UTF-8 is handled exactly like a text frame; one that does not cannot
/// carry a command and is dropped.
fn text_payload(data: &[u8]) -> Option<Utf8Bytes> {
    match std::str::from_utf8(data) {
        Ok(text) => Some(Utf8Bytes::from(text.to_owned())),
        Err(e) => {
            debug!(error = %e, "non-UTF-8 binary frame dropped");
            None
        }
    }
}
