//! Pegboard server binary.
//!
//! Wires the shared data store, the fan-out dispatch loop, and the Axum
//! server together.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `pegboard.yaml`
//! 3. Create the store and spawn the fan-out dispatcher
//! 4. Serve until the process is terminated

use std::path::Path;
use std::sync::Arc;

use pegboard_server::{config, server, state::AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or the server itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("pegboard-server starting");

    // 2. Load configuration.
    let config = config::load(Path::new("pegboard.yaml"))?;
    info!(
        host = %config.host,
        port = config.port,
        public_dir = %config.public_dir.display(),
        "configuration loaded"
    );

    // 3. Create the store and spawn the fan-out dispatcher.
    let (state, dispatcher) = AppState::new();
    tokio::spawn(dispatcher.run());

    // 4. Serve.
    server::start_server(&config, Arc::new(state)).await?;
    Ok(())
}
