//! Concurrent store, command processor, and observer fan-out for the
//! Pegboard data server.
//!
//! This crate is transport-agnostic: sessions hand it raw frame text and
//! receive typed frames from [`pegboard_types`] back. The pieces fit
//! together like this:
//!
//! - [`store::DataStore`] owns both data structures (list store and scalar
//!   store), the per-key wait lists behind blocking `get`, and the live
//!   client counter, all under a single lock. Every successful mutation
//!   submits an event to the fan-out queue *inside* that lock, so queue
//!   order equals store order.
//! - [`processor`] decodes raw client frames, maps each command onto the
//!   matching store operation, and produces the optional text reply.
//!   Malformed payloads are logged and dropped here, in one place, for
//!   every session layer.
//! - [`fanout`] runs the single dispatch loop that delivers every event, in
//!   submission order, to every registered observer, and handles observer
//!   registration (snapshot sync first, then live events -- nothing missed,
//!   nothing duplicated).
//! - [`admin`] implements the observer-only operations: `download` the full
//!   store and `upload` a replacement.

pub mod admin;
pub mod error;
pub mod fanout;
pub mod processor;
pub mod store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use fanout::{FanoutDispatcher, FanoutMessage, FanoutQueue, ObserverHandle};
pub use store::{DataStore, StoreStats};
