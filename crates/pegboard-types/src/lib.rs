//! Shared type definitions for the Pegboard data server.
//!
//! This crate is the single source of truth for everything that crosses a
//! connection: client command frames, broadcast event frames, snapshot sync
//! frames, and the snapshot payload itself. The serde derives on these types
//! *are* the wire format; the server crate turns them into JSON text frames
//! at the transport boundary.
//!
//! # Modules
//!
//! - [`command`] -- Client request frame and its parsed [`Command`] form
//! - [`event`] -- Store events and their flat broadcast wire shape
//! - [`snapshot`] -- Full-store snapshots and observer sync frames

pub mod command;
pub mod event;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use command::{ClientRequest, Command, CommandKind, UnknownCommand};
pub use event::{EventFrame, StoreEvent};
pub use snapshot::{ServerFrame, Snapshot, SyncFrame};
