//! HTTP endpoint handlers outside the `WebSocket` protocol.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::state::AppState;

/// Serve a minimal HTML page showing server status and entry points.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.store.stats();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Pegboard</title></head>
<body>
  <h1>Pegboard</h1>
  <p>Connected clients: {clients}</p>
  <p>List keys: {list_keys} &middot; Scalar keys: {scalar_keys}</p>
  <ul>
    <li><code>ws://&hellip;/connect</code> &mdash; data clients</li>
    <li><code>ws://&hellip;/admin</code> &mdash; observers</li>
    <li><a href="/public/">/public/</a> &mdash; static assets</li>
  </ul>
</body>
</html>"#,
        clients = stats.clients,
        list_keys = stats.list_keys,
        scalar_keys = stats.scalar_keys,
    ))
}
