//! Client command frames and their parsed form.
//!
//! Clients send a flat JSON object `{command, key, values, value}` over
//! their connection. [`ClientRequest`] mirrors that shape exactly (every
//! field defaulted, so partial frames decode); [`Command`] is the validated
//! form the store operates on. Frames whose `command` discriminant is not
//! recognized parse to [`UnknownCommand`] so the session can reply with the
//! literal error text instead of silently dropping the request.

use serde::{Deserialize, Serialize};

/// Raw client-to-server frame as it appears on the wire.
///
/// All fields are defaulted: a command that does not use `values` or
/// `value` simply omits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRequest {
    /// The command discriminant (`addTop`, `addBottom`, `removeTop`,
    /// `removeBottom`, `set`, `get`; observers additionally send
    /// `download` and `upload`).
    pub command: String,
    /// The key being manipulated.
    pub key: String,
    /// The values being added (`addTop`, `addBottom`).
    pub values: Vec<String>,
    /// The singular value (`set`, `upload`).
    pub value: String,
}

/// The known command discriminants, as they appear in broadcast events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    /// Prepend values to a list key.
    AddTop,
    /// Append values to a list key.
    AddBottom,
    /// Pop the first entry of a list key.
    RemoveTop,
    /// Pop the last entry of a list key.
    RemoveBottom,
    /// Overwrite a scalar key.
    Set,
    /// Read a scalar key, waiting for it if absent.
    Get,
}

impl CommandKind {
    /// The wire token for this command, as used in event frames.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddTop => "addTop",
            Self::AddBottom => "addBottom",
            Self::RemoveTop => "removeTop",
            Self::RemoveBottom => "removeBottom",
            Self::Set => "set",
            Self::Get => "get",
        }
    }
}

/// A validated client command ready for dispatch against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Prepend `values` to the key's list, preserving their order.
    AddTop {
        /// Target list key.
        key: String,
        /// Entries to prepend.
        values: Vec<String>,
    },
    /// Append `values` to the key's list.
    AddBottom {
        /// Target list key.
        key: String,
        /// Entries to append.
        values: Vec<String>,
    },
    /// Remove and return the first entry of the key's list.
    RemoveTop {
        /// Target list key.
        key: String,
    },
    /// Remove and return the last entry of the key's list.
    RemoveBottom {
        /// Target list key.
        key: String,
    },
    /// Unconditionally overwrite the scalar value for the key.
    Set {
        /// Target scalar key.
        key: String,
        /// The new value.
        value: String,
    },
    /// Read the scalar value for the key, suspending until one exists.
    Get {
        /// Target scalar key.
        key: String,
    },
}

/// Error returned when a frame's `command` discriminant is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(
    /// The unrecognized discriminant as received.
    pub String,
);

impl Command {
    /// Parse a raw frame into a validated command.
    pub fn from_request(request: ClientRequest) -> Result<Self, UnknownCommand> {
        let ClientRequest {
            command,
            key,
            values,
            value,
        } = request;
        match command.as_str() {
            "addTop" => Ok(Self::AddTop { key, values }),
            "addBottom" => Ok(Self::AddBottom { key, values }),
            "removeTop" => Ok(Self::RemoveTop { key }),
            "removeBottom" => Ok(Self::RemoveBottom { key }),
            "set" => Ok(Self::Set { key, value }),
            "get" => Ok(Self::Get { key }),
            _ => Err(UnknownCommand(command.clone())),
        }
    }

    /// The discriminant of this command.
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::AddTop { .. } => CommandKind::AddTop,
            Self::AddBottom { .. } => CommandKind::AddBottom,
            Self::RemoveTop { .. } => CommandKind::RemoveTop,
            Self::RemoveBottom { .. } => CommandKind::RemoveBottom,
            Self::Set { .. } => CommandKind::Set,
            Self::Get { .. } => CommandKind::Get,
        }
    }
}
