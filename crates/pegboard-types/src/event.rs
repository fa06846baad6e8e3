//! Store events and their flat broadcast wire shape.
//!
//! Internally an event is the closed sum [`StoreEvent`]: either the live
//! client count changed, or a command mutated the store. On the wire every
//! broadcast is the flat [`EventFrame`] `{type, key, command, values, value}`
//! with unused fields left empty, so observer clients can switch on `type`
//! without schema negotiation.

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;

/// `type` token for a client-count broadcast.
pub const CLIENT_EVENT: &str = "clientEvent";

/// `type` token for a data-mutation broadcast.
pub const DATA_EVENT: &str = "dataEvent";

/// `type` token for a `download` reply.
pub const DOWNLOAD: &str = "download";

/// An event emitted by the store after a successful mutation or a
/// connection-count change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The number of connected data clients changed.
    ClientCount(usize),
    /// A command mutated the store.
    Data {
        /// The affected key.
        key: String,
        /// The originating command.
        command: CommandKind,
        /// The value(s) added, removed, set, or read.
        values: Vec<String>,
    },
}

impl StoreEvent {
    /// Build a data-mutation event.
    pub fn data(key: &str, command: CommandKind, values: Vec<String>) -> Self {
        Self::Data {
            key: key.to_owned(),
            command,
            values,
        }
    }
}

/// Flat server-to-observer event frame as it appears on the wire.
///
/// Fields a given `type` does not use are serialized empty, matching the
/// fixed frame layout observer clients expect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFrame {
    /// Frame discriminant: [`CLIENT_EVENT`], [`DATA_EVENT`], or [`DOWNLOAD`].
    #[serde(rename = "type")]
    pub kind: String,
    /// The key that was manipulated. Always present for data events.
    pub key: String,
    /// The command that was issued.
    pub command: String,
    /// The value(s) that were added or removed; for client events, the
    /// new count rendered as text.
    pub values: Vec<String>,
    /// The singular value (`download` payload).
    pub value: String,
}

impl EventFrame {
    /// Build a `download` reply frame wrapping a serialized snapshot.
    pub fn download(payload: String) -> Self {
        Self {
            kind: String::from(DOWNLOAD),
            value: payload,
            ..Self::default()
        }
    }
}

impl From<&StoreEvent> for EventFrame {
    fn from(event: &StoreEvent) -> Self {
        match event {
            StoreEvent::ClientCount(count) => Self {
                kind: String::from(CLIENT_EVENT),
                values: vec![count.to_string()],
                ..Self::default()
            },
            StoreEvent::Data {
                key,
                command,
                values,
            } => Self {
                kind: String::from(DATA_EVENT),
                key: key.clone(),
                command: String::from(command.as_str()),
                values: values.clone(),
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_event_frame_shape() {
        let event = StoreEvent::data("k", CommandKind::AddBottom, vec![String::from("a")]);
        let frame = EventFrame::from(&event);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "type": "dataEvent",
                "key": "k",
                "command": "addBottom",
                "values": ["a"],
                "value": "",
            })
        );
    }

    #[test]
    fn client_count_frame_renders_count_as_text() {
        let frame = EventFrame::from(&StoreEvent::ClientCount(3));
        assert_eq!(frame.kind, CLIENT_EVENT);
        assert_eq!(frame.values, vec![String::from("3")]);
        assert!(frame.key.is_empty());
        assert!(frame.command.is_empty());
    }

    #[test]
    fn download_frame_carries_payload_verbatim() {
        let frame = EventFrame::download(String::from(r#"{"csv":{},"kvp":{}}"#));
        assert_eq!(frame.kind, DOWNLOAD);
        assert_eq!(frame.value, r#"{"csv":{},"kvp":{}}"#);
    }
}
