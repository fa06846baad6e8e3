//! Command processing: one raw client frame in, an optional reply out.
//!
//! [`decode`] is the single place raw frame text turns into a [`Decoded`]
//! outcome, so every session layer handles bad input the same way: a
//! malformed payload is logged and dropped with no reply, while a
//! well-formed frame naming a command the protocol does not have earns the
//! literal error reply. The dispatch table mirrors the protocol exactly:
//! adds and `set` are fire-and-forget, removes reply with the removed value
//! or an error text, and `get` replies with the resolved value (and may
//! suspend on the way). Every successful mutation's event is submitted by
//! the store itself, inside its lock, so this module never emits anything
//! for a frame that failed or never parsed.

use pegboard_types::{ClientRequest, Command};

use crate::error::StoreError;
use crate::store::DataStore;

/// Reply sent to a session that issued an unrecognized command.
pub const UNKNOWN_COMMAND_REPLY: &str = "Error: Unknown command";

/// Outcome of decoding one raw client frame.
#[derive(Debug)]
pub enum Decoded {
    /// A validated command, ready for [`dispatch`].
    Command(Command),
    /// A well-formed frame naming a command the protocol does not have.
    Unknown,
    /// A payload that does not decode as a request frame at all.
    Malformed,
}

/// Decode one raw client frame.
///
/// Decode failures are logged here, once, for every session layer.
pub fn decode(text: &str) -> Decoded {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "malformed request dropped");
            return Decoded::Malformed;
        }
    };
    match Command::from_request(request) {
        Ok(command) => Decoded::Command(command),
        Err(unknown) => {
            tracing::debug!(error = %unknown, "rejecting request");
            Decoded::Unknown
        }
    }
}

/// Decode and execute one raw client frame.
///
/// Returns the text reply to send back to the issuing session, if any; a
/// malformed payload produces no reply at all.
pub async fn process_text(store: &DataStore, text: &str) -> Option<String> {
    match decode(text) {
        Decoded::Command(command) => dispatch(store, command).await,
        Decoded::Unknown => Some(String::from(UNKNOWN_COMMAND_REPLY)),
        Decoded::Malformed => None,
    }
}

/// Execute a validated command against the store.
///
/// `get` suspends here when its key has no value yet; callers that need to
/// abandon the wait on connection teardown should drive [`DataStore::get`]
/// directly so they can drop the future.
pub async fn dispatch(store: &DataStore, command: Command) -> Option<String> {
    match command {
        Command::AddTop { key, values } => {
            store.add_top(&key, &values);
            None
        }
        Command::AddBottom { key, values } => {
            store.add_bottom(&key, &values);
            None
        }
        Command::RemoveTop { key } => Some(reply(store.remove_top(&key))),
        Command::RemoveBottom { key } => Some(reply(store.remove_bottom(&key))),
        Command::Set { key, value } => {
            store.set(&key, &value);
            None
        }
        Command::Get { key } => Some(reply(store.get(&key).await)),
    }
}

/// Render a store result as reply text.
fn reply(result: Result<String, StoreError>) -> String {
    result.unwrap_or_else(|e| format!("Error: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fanout;

    fn test_store() -> DataStore {
        let (queue, _dispatcher) = fanout::channel();
        DataStore::new(queue)
    }

    fn frame(command: &str, key: &str, values: &[&str], value: &str) -> String {
        serde_json::json!({
            "command": command,
            "key": key,
            "values": values,
            "value": value,
        })
        .to_string()
    }

    #[tokio::test]
    async fn adds_and_set_produce_no_reply() {
        let store = test_store();
        assert_eq!(process_text(&store, &frame("addTop", "k", &["a"], "")).await, None);
        assert_eq!(process_text(&store, &frame("addBottom", "k", &["b"], "")).await, None);
        assert_eq!(process_text(&store, &frame("set", "x", &[], "v1")).await, None);
    }

    #[tokio::test]
    async fn remove_replies_with_the_removed_value() {
        let store = test_store();
        process_text(&store, &frame("addBottom", "k", &["a", "b"], "")).await;
        assert_eq!(
            process_text(&store, &frame("removeTop", "k", &[], "")).await,
            Some(String::from("a"))
        );
        assert_eq!(
            process_text(&store, &frame("removeBottom", "k", &[], "")).await,
            Some(String::from("b"))
        );
    }

    #[tokio::test]
    async fn remove_on_missing_key_replies_with_error_text() {
        let store = test_store();
        let reply = process_text(&store, &frame("removeTop", "missing", &[], ""))
            .await
            .unwrap();
        assert_eq!(reply, "Error: no values under key 'missing'");
    }

    #[tokio::test]
    async fn get_replies_with_the_stored_value() {
        let store = test_store();
        process_text(&store, &frame("set", "x", &[], "v1")).await;
        assert_eq!(
            process_text(&store, &frame("get", "x", &[], "")).await,
            Some(String::from("v1"))
        );
    }

    #[tokio::test]
    async fn unknown_command_earns_the_literal_reply() {
        let store = test_store();
        assert_eq!(
            process_text(&store, &frame("clear", "k", &[], "")).await,
            Some(String::from(UNKNOWN_COMMAND_REPLY))
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_a_reply() {
        let store = test_store();
        assert_eq!(process_text(&store, "not json at all").await, None);
        assert_eq!(process_text(&store, r#"{"command": 7}"#).await, None);
        assert_eq!(process_text(&store, r#"["addTop", "k"]"#).await, None);
        assert!(store.snapshot().is_empty());
    }
}
