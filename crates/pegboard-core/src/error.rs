//! Error taxonomy for the store core.
//!
//! Nothing here is fatal to the process: every variant is scoped to the
//! command or connection that triggered it. Transport failures live in the
//! server crate; malformed frames are dropped at the decode boundary before
//! they reach the store.

/// Errors produced by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A remove was issued against a key that is absent or whose list is
    /// already empty.
    #[error("no values under key '{key}'")]
    EmptyOrMissingKey {
        /// The key the remove targeted.
        key: String,
    },

    /// The store was torn down while a blocking `get` was suspended.
    #[error("store closed while waiting for key '{key}'")]
    ClosedWhileWaiting {
        /// The key the `get` was waiting on.
        key: String,
    },
}
