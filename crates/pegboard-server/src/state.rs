//! Shared application state for the server.
//!
//! [`AppState`] pairs the data store with the producer handle of its
//! fan-out queue. It is wrapped in [`Arc`](std::sync::Arc) and injected
//! into handlers via Axum's `State` extractor. The matching dispatcher is
//! returned separately so the caller decides where its task runs -- tests
//! spawn it locally, the binary spawns it at startup.

use std::sync::Arc;

use pegboard_core::{fanout, DataStore, FanoutDispatcher, FanoutQueue};

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The shared data store.
    pub store: Arc<DataStore>,
    /// Producer handle for the fan-out queue (observer deregistration).
    pub fanout: FanoutQueue,
}

impl AppState {
    /// Create the store together with the fan-out dispatcher that serves
    /// it. The dispatcher must be spawned for observers to receive
    /// anything.
    pub fn new() -> (Self, FanoutDispatcher) {
        let (queue, dispatcher) = fanout::channel();
        let store = Arc::new(DataStore::new(queue.clone()));
        (
            Self {
                store,
                fanout: queue,
            },
            dispatcher,
        )
    }
}
