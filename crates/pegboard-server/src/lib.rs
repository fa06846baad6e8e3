//! WebSocket server for the Pegboard data store.
//!
//! This crate is the transport boundary around [`pegboard_core`]. It exposes:
//!
//! - **`GET /connect`** -- data client `WebSocket`: JSON command frames in,
//!   optional text replies out
//! - **`GET /admin`** -- observer `WebSocket`: full state sync on connect,
//!   then the live event stream, plus `download`/`upload`
//! - **`GET /`** -- minimal HTML status page
//! - **`/public/*`** -- static file serving from a configurable directory
//!
//! # Architecture
//!
//! Each connection runs its own task; one background task runs the fan-out
//! dispatch loop. The core never touches a socket: sessions decode frames
//! with `serde_json` at this boundary and hand typed values inward.

pub mod config;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use config::ServerConfig;
pub use router::build_router;
pub use server::{start_server, ServerError};
pub use state::AppState;
