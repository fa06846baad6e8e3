//! The concurrent data store at the heart of the server.
//!
//! [`DataStore`] owns two structures -- the list store (key to ordered
//! entries) and the scalar store (key to single value) -- plus the per-key
//! wait lists behind blocking `get` and the live client counter. All of it
//! sits behind **one** mutex: a single exclusivity domain, so a snapshot is
//! always consistent across both structures and the counter can never be
//! observed out of step with data events.
//!
//! The lock is a `std::sync::Mutex` and is never held across an await.
//! `get` is the only operation that suspends: it registers a oneshot waiter
//! under the lock, releases it, and parks until `set` (or `replace`) wakes
//! it with the new value. A cancelled `get` removes its waiter via a drop
//! guard, so an abandoned connection leaks nothing.
//!
//! Every successful mutation submits its event to the fan-out queue while
//! the lock is still held. Queue order therefore equals store order, which
//! is what lets observer registration (snapshot capture plus a `Register`
//! message, also under the lock) guarantee that no event is missed or
//! duplicated around the initial sync.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pegboard_types::{CommandKind, Snapshot, StoreEvent};
use tokio::sync::oneshot;

use crate::error::StoreError;
use crate::fanout::{FanoutMessage, FanoutQueue, ObserverHandle};

/// A suspended `get` waiting for a `set` on its key.
#[derive(Debug)]
struct Waiter {
    id: u64,
    tx: oneshot::Sender<String>,
}

/// Everything guarded by the store's single lock.
#[derive(Debug, Default)]
struct StoreInner {
    /// List store: ordered entries per key. Keys are created on first
    /// write and never deleted, even once emptied.
    lists: HashMap<String, VecDeque<String>>,
    /// Scalar store: a key with no entry is absent, which is distinct
    /// from a key holding the empty string.
    scalars: HashMap<String, String>,
    /// Suspended `get` calls, per key.
    waiters: HashMap<String, Vec<Waiter>>,
    /// Next waiter id, monotonically increasing.
    next_waiter_id: u64,
    /// Number of currently connected data clients.
    client_count: usize,
}

/// Counts reported by [`DataStore::stats`] for the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Connected data clients.
    pub clients: usize,
    /// Keys present in the list store.
    pub list_keys: usize,
    /// Keys present in the scalar store.
    pub scalar_keys: usize,
}

/// The shared in-memory data store.
#[derive(Debug)]
pub struct DataStore {
    inner: Mutex<StoreInner>,
    fanout: FanoutQueue,
}

impl DataStore {
    /// Create an empty store that submits its events to `fanout`.
    pub fn new(fanout: FanoutQueue) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            fanout,
        }
    }

    /// Acquire the store lock, recovering from poisoning.
    ///
    /// The guarded operations never panic, but a poisoned lock must not
    /// take the whole store down with it.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prepend `values` to the key's list, preserving their order.
    /// Creates the key if absent.
    pub fn add_top(&self, key: &str, values: &[String]) {
        let mut inner = self.lock();
        let list = inner.lists.entry(key.to_owned()).or_default();
        for value in values.iter().rev() {
            list.push_front(value.clone());
        }
        self.fanout
            .submit_event(StoreEvent::data(key, CommandKind::AddTop, values.to_vec()));
        drop(inner);
    }

    /// Append `values` to the key's list. Creates the key if absent.
    pub fn add_bottom(&self, key: &str, values: &[String]) {
        let mut inner = self.lock();
        inner
            .lists
            .entry(key.to_owned())
            .or_default()
            .extend(values.iter().cloned());
        self.fanout
            .submit_event(StoreEvent::data(key, CommandKind::AddBottom, values.to_vec()));
        drop(inner);
    }

    /// Remove and return the first entry of the key's list.
    pub fn remove_top(&self, key: &str) -> Result<String, StoreError> {
        let mut inner = self.lock();
        let Some(value) = inner.lists.get_mut(key).and_then(VecDeque::pop_front) else {
            return Err(StoreError::EmptyOrMissingKey { key: key.to_owned() });
        };
        self.fanout.submit_event(StoreEvent::data(
            key,
            CommandKind::RemoveTop,
            vec![value.clone()],
        ));
        drop(inner);
        Ok(value)
    }

    /// Remove and return the last entry of the key's list.
    pub fn remove_bottom(&self, key: &str) -> Result<String, StoreError> {
        let mut inner = self.lock();
        let Some(value) = inner.lists.get_mut(key).and_then(VecDeque::pop_back) else {
            return Err(StoreError::EmptyOrMissingKey { key: key.to_owned() });
        };
        self.fanout.submit_event(StoreEvent::data(
            key,
            CommandKind::RemoveBottom,
            vec![value.clone()],
        ));
        drop(inner);
        Ok(value)
    }

    /// Unconditionally overwrite the scalar value for `key`, waking every
    /// `get` currently suspended on it.
    pub fn set(&self, key: &str, value: &str) {
        let mut inner = self.lock();
        inner.scalars.insert(key.to_owned(), value.to_owned());
        if let Some(waiters) = inner.waiters.remove(key) {
            for waiter in waiters {
                // A waiter whose `get` was cancelled has already dropped
                // its receiving half; that send failure is not an error.
                let _ = waiter.tx.send(value.to_owned());
            }
        }
        self.fanout
            .submit_event(StoreEvent::data(key, CommandKind::Set, vec![value.to_owned()]));
        drop(inner);
    }

    /// Read the scalar value for `key`.
    ///
    /// Returns immediately when the key is present (the empty string
    /// counts as present). Otherwise the call suspends -- without holding
    /// the lock, so every other key and session keeps making progress --
    /// until a `set` for this exact key supplies a value. Dropping the
    /// returned future (connection teardown) deregisters the waiter.
    pub async fn get(&self, key: &str) -> Result<String, StoreError> {
        let (rx, mut guard) = {
            let mut inner = self.lock();
            if let Some(value) = inner.scalars.get(key) {
                let value = value.clone();
                self.fanout.submit_event(StoreEvent::data(
                    key,
                    CommandKind::Get,
                    vec![value.clone()],
                ));
                return Ok(value);
            }
            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            let (tx, rx) = oneshot::channel();
            inner
                .waiters
                .entry(key.to_owned())
                .or_default()
                .push(Waiter { id, tx });
            (
                rx,
                WaitGuard {
                    store: self,
                    key: key.to_owned(),
                    id,
                    armed: true,
                },
            )
        };

        let result = rx.await;
        // Whichever way the oneshot resolved, the registration is gone:
        // either `set`/`replace` consumed it or the sender was dropped
        // along with the store.
        guard.armed = false;
        let value = result.map_err(|_| StoreError::ClosedWhileWaiting { key: key.to_owned() })?;

        // Re-enter the exclusivity domain to report the resolved read in
        // order with whatever else is happening.
        let inner = self.lock();
        self.fanout
            .submit_event(StoreEvent::data(key, CommandKind::Get, vec![value.clone()]));
        drop(inner);
        Ok(value)
    }

    /// Capture a consistent point-in-time copy of both structures.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Self::snapshot_locked(&inner)
    }

    fn snapshot_locked(inner: &StoreInner) -> Snapshot {
        Snapshot {
            csv: inner
                .lists
                .iter()
                .map(|(key, list)| (key.clone(), list.iter().cloned().collect()))
                .collect(),
            kvp: inner
                .scalars
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Atomically overwrite both structures with the snapshot's contents.
    ///
    /// Suspended `get`s whose key now holds a value are woken with it, so
    /// an upload behaves like a `set` for them. No event is emitted; see
    /// `DESIGN.md` for why that asymmetry is preserved.
    pub fn replace(&self, snapshot: Snapshot) {
        let mut inner = self.lock();
        Self::replace_locked(&mut inner, snapshot);
        drop(inner);
    }

    /// [`replace`](Self::replace), plus a resync of the uploading observer
    /// queued in the same critical section.
    ///
    /// The resync rides the fan-out queue, so it arrives after every event
    /// submitted before the replace and before every event submitted after
    /// it. The rest of the registry gets nothing, matching the source
    /// behavior this server preserves.
    pub fn replace_from_upload(&self, uploader: &ObserverHandle, snapshot: Snapshot) {
        let mut inner = self.lock();
        Self::replace_locked(&mut inner, snapshot);
        let current = Self::snapshot_locked(&inner);
        self.fanout.submit(FanoutMessage::Resync {
            observer: uploader.clone(),
            snapshot: current,
        });
        drop(inner);
    }

    fn replace_locked(inner: &mut StoreInner, snapshot: Snapshot) {
        inner.lists = snapshot
            .csv
            .into_iter()
            .map(|(key, entries)| (key, entries.into_iter().collect()))
            .collect();
        inner.scalars = snapshot.kvp.into_iter().collect();

        let filled: Vec<String> = inner
            .waiters
            .keys()
            .filter(|key| inner.scalars.contains_key(*key))
            .cloned()
            .collect();
        for key in filled {
            let Some(value) = inner.scalars.get(&key).cloned() else {
                continue;
            };
            if let Some(waiters) = inner.waiters.remove(&key) {
                for waiter in waiters {
                    let _ = waiter.tx.send(value.clone());
                }
            }
        }
    }

    /// Record a new data client connection and broadcast the new count.
    pub fn client_connected(&self) -> usize {
        let mut inner = self.lock();
        inner.client_count += 1;
        let count = inner.client_count;
        self.fanout.submit_event(StoreEvent::ClientCount(count));
        drop(inner);
        count
    }

    /// Record a data client disconnection and broadcast the new count.
    pub fn client_disconnected(&self) -> usize {
        let mut inner = self.lock();
        inner.client_count = inner.client_count.saturating_sub(1);
        let count = inner.client_count;
        self.fanout.submit_event(StoreEvent::ClientCount(count));
        drop(inner);
        count
    }

    /// Register an observer: capture the snapshot and enqueue the
    /// registration in one critical section, so the fan-out queue sees the
    /// registration exactly between the events the snapshot contains and
    /// the events it does not.
    pub fn register_observer(&self, observer: ObserverHandle) {
        let inner = self.lock();
        let snapshot = Self::snapshot_locked(&inner);
        self.fanout
            .submit(FanoutMessage::Register { observer, snapshot });
        drop(inner);
    }

    /// Current counts for the status page.
    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            clients: inner.client_count,
            list_keys: inner.lists.len(),
            scalar_keys: inner.scalars.len(),
        }
    }

    /// Number of suspended `get`s registered for `key`.
    #[cfg(test)]
    fn waiter_count(&self, key: &str) -> usize {
        self.lock().waiters.get(key).map_or(0, Vec::len)
    }
}

/// Removes a waiter registration when a suspended `get` is dropped before
/// it resolves.
struct WaitGuard<'a> {
    store: &'a DataStore,
    key: String,
    id: u64,
    armed: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.store.lock();
        if let Some(waiters) = inner.waiters.get_mut(&self.key) {
            waiters.retain(|waiter| waiter.id != self.id);
        }
        if inner.waiters.get(&self.key).is_some_and(Vec::is_empty) {
            inner.waiters.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::fanout;

    /// Store wired to a queue whose dispatcher is never run; events just
    /// accumulate in the channel, which these tests do not inspect.
    fn test_store() -> DataStore {
        let (queue, _dispatcher) = fanout::channel();
        DataStore::new(queue)
    }

    fn values(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn add_bottom_then_remove_top_is_fifo() {
        let store = test_store();
        store.add_bottom("k", &values(&["a", "b"]));
        assert_eq!(store.remove_top("k").unwrap(), "a");
        assert_eq!(store.snapshot().csv.get("k").unwrap(), &values(&["b"]));
    }

    #[test]
    fn add_top_preserves_value_order() {
        let store = test_store();
        store.add_bottom("k", &values(&["c"]));
        store.add_top("k", &values(&["a", "b"]));
        assert_eq!(store.snapshot().csv.get("k").unwrap(), &values(&["a", "b", "c"]));
    }

    #[test]
    fn command_sequence_matches_reference_deque() {
        let store = test_store();
        let mut reference: VecDeque<String> = VecDeque::new();

        store.add_bottom("k", &values(&["a", "b", "c"]));
        reference.extend(values(&["a", "b", "c"]));
        store.add_top("k", &values(&["x", "y"]));
        for value in values(&["x", "y"]).into_iter().rev() {
            reference.push_front(value);
        }

        assert_eq!(store.remove_bottom("k").unwrap(), reference.pop_back().unwrap());
        assert_eq!(store.remove_top("k").unwrap(), reference.pop_front().unwrap());
        assert_eq!(store.remove_top("k").unwrap(), reference.pop_front().unwrap());

        let remaining: Vec<String> = reference.into_iter().collect();
        assert_eq!(store.snapshot().csv.get("k").unwrap(), &remaining);
    }

    #[test]
    fn remove_on_missing_key_reports_error_and_leaves_store_unchanged() {
        let store = test_store();
        assert_eq!(
            store.remove_top("missing"),
            Err(StoreError::EmptyOrMissingKey {
                key: String::from("missing")
            })
        );
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn remove_on_emptied_key_reports_error_but_key_survives() {
        let store = test_store();
        store.add_bottom("k", &values(&["only"]));
        assert_eq!(store.remove_bottom("k").unwrap(), "only");
        assert!(store.remove_bottom("k").is_err());
        // The key is still present, just empty.
        assert_eq!(store.snapshot().csv.get("k").unwrap(), &Vec::<String>::new());
    }

    #[tokio::test]
    async fn get_returns_existing_value_without_suspending() {
        let store = test_store();
        store.set("x", "v1");
        assert_eq!(store.get("x").await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn get_distinguishes_empty_value_from_absent_key() {
        let store = test_store();
        store.set("x", "");
        // Present-but-empty resolves immediately.
        assert_eq!(store.get("x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn get_suspends_until_set_supplies_the_value() {
        let store = Arc::new(test_store());
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("x").await })
        };
        // Give the reader a chance to register its waiter.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.waiter_count("x"), 1);

        // Mutating other keys does not disturb the suspended reader.
        store.set("y", "other");
        assert_eq!(store.waiter_count("x"), 1);

        store.set("x", "v1");
        let value = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(value, "v1");
        assert_eq!(store.waiter_count("x"), 0);
    }

    #[tokio::test]
    async fn get_resolves_with_first_subsequent_set() {
        let store = Arc::new(test_store());
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("x").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.set("x", "first");
        store.set("x", "second");
        assert_eq!(reader.await.unwrap().unwrap(), "first");
    }

    #[tokio::test]
    async fn cancelled_get_leaves_no_waiter_behind() {
        let store = test_store();
        let timed_out = tokio::time::timeout(Duration::from_millis(10), store.get("x")).await;
        assert!(timed_out.is_err());
        assert_eq!(store.waiter_count("x"), 0);
        // A later set finds nobody to wake and simply stores the value.
        store.set("x", "v1");
        assert_eq!(store.get("x").await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn replace_wakes_waiters_whose_key_gained_a_value() {
        let store = Arc::new(test_store());
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get("x").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut snapshot = Snapshot::default();
        snapshot.kvp.insert(String::from("x"), String::from("uploaded"));
        store.replace(snapshot);

        assert_eq!(reader.await.unwrap().unwrap(), "uploaded");
        assert_eq!(store.waiter_count("x"), 0);
    }

    #[test]
    fn replace_overwrites_both_structures() {
        let store = test_store();
        store.add_bottom("old", &values(&["gone"]));
        store.set("stale", "gone");

        let mut snapshot = Snapshot::default();
        snapshot.csv.insert(String::from("k"), values(&["a"]));
        snapshot.kvp.insert(String::from("x"), String::from("v1"));
        store.replace(snapshot.clone());

        assert_eq!(store.snapshot(), snapshot);
    }

    #[test]
    fn client_counter_tracks_connections() {
        let store = test_store();
        assert_eq!(store.client_connected(), 1);
        assert_eq!(store.client_connected(), 2);
        assert_eq!(store.client_disconnected(), 1);
        assert_eq!(store.stats().clients, 1);
    }
}
