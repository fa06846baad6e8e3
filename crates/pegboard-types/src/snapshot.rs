//! Full-store snapshots and observer sync frames.
//!
//! A [`Snapshot`] is plain owned data: the complete contents of the list
//! store and the scalar store at one instant, with no references back into
//! live storage. Observers receive it in two pieces on registration (a
//! `csvSync` frame then a `kvpSync` frame) and as a single JSON payload in
//! `download` replies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::EventFrame;

/// The full contents of both stores at one instant.
///
/// Field names are the fixed wire names of the download/upload payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// List store: key to ordered entries.
    #[serde(default)]
    pub csv: BTreeMap<String, Vec<String>>,
    /// Scalar store: key to single value.
    #[serde(default)]
    pub kvp: BTreeMap<String, String>,
}

impl Snapshot {
    /// Whether both stores are empty.
    pub fn is_empty(&self) -> bool {
        self.csv.is_empty() && self.kvp.is_empty()
    }
}

/// A one-shot state sync frame sent to an observer.
///
/// Serializes as `{"type": "csvSync"|"kvpSync", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SyncFrame {
    /// Full list-store contents.
    CsvSync(BTreeMap<String, Vec<String>>),
    /// Full scalar-store contents.
    KvpSync(BTreeMap<String, String>),
}

/// Any frame the server sends to an observer connection.
///
/// The variants have disjoint wire shapes, so the enum serializes without
/// an outer tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// State synchronization (registration and post-upload resync).
    Sync(SyncFrame),
    /// Broadcast event or download reply.
    Event(EventFrame),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot
            .csv
            .insert(String::from("k"), vec![String::from("a"), String::from("b")]);
        snapshot.kvp.insert(String::from("x"), String::from("v1"));
        snapshot
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot = sample();
        let text = serde_json::to_string(&snapshot).unwrap();
        let parsed: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn snapshot_payload_field_names_are_fixed() {
        assert_eq!(
            serde_json::to_value(sample()).unwrap(),
            json!({
                "csv": {"k": ["a", "b"]},
                "kvp": {"x": "v1"},
            })
        );
    }

    #[test]
    fn sync_frames_are_tagged_with_data_payload() {
        let snapshot = sample();
        let frame = SyncFrame::CsvSync(snapshot.csv);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "csvSync", "data": {"k": ["a", "b"]}})
        );
        let frame = SyncFrame::KvpSync(snapshot.kvp);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "kvpSync", "data": {"x": "v1"}})
        );
    }

    #[test]
    fn empty_upload_payload_decodes_to_empty_snapshot() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
    }
}
