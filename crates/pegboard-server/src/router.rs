//! Axum router construction.
//!
//! Assembles the `WebSocket` endpoints, the status page, and static file
//! serving into a single [`Router`] with CORS middleware enabled so
//! browser-based observer dashboards can connect from anywhere.

use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /connect` -- data client `WebSocket`
/// - `GET /admin` -- observer `WebSocket`
/// - `/public/*` -- static files from `public_dir`
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>, public_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket entry points
        .route("/connect", get(ws::ws_connect))
        .route("/admin", get(ws::ws_admin))
        // Static assets
        .nest_service("/public", ServeDir::new(public_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
