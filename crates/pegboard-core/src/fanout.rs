//! Event fan-out: one queue, one dispatch loop, many observers.
//!
//! Producers (store operations, observer sessions) submit [`FanoutMessage`]s
//! onto a single unbounded MPSC queue via a cloned [`FanoutQueue`]. A
//! dedicated task runs [`FanoutDispatcher::run`], which processes messages
//! strictly in submission order:
//!
//! - an event is delivered to every currently registered observer; a failed
//!   delivery removes that observer and moves on (never blocking the rest,
//!   never re-queuing the event);
//! - a registration sends the snapshot captured with it (`csvSync` then
//!   `kvpSync`) before the observer joins the registry, so the observer sees
//!   exactly the events submitted after its snapshot;
//! - a deregistration drops the observer.
//!
//! The registry is owned by the dispatcher, not ambient global state, so
//! tests can stand up independent store/dispatcher pairs.

use std::collections::HashMap;

use pegboard_types::{EventFrame, ServerFrame, Snapshot, StoreEvent, SyncFrame};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

/// Messages accepted by the dispatch loop.
#[derive(Debug)]
pub enum FanoutMessage {
    /// Deliver a store event to every registered observer.
    Event(StoreEvent),
    /// Register a new observer together with the snapshot captured at
    /// registration time (under the store lock).
    Register {
        /// The observer's outbound channel.
        observer: ObserverHandle,
        /// Store contents at the moment of registration.
        snapshot: Snapshot,
    },
    /// Resync a single observer after an upload replaced the store. Riding
    /// the queue keeps the fresh sync frames ordered after every event
    /// submitted before the replace.
    Resync {
        /// The observer to resync (the uploader).
        observer: ObserverHandle,
        /// Store contents right after the replace.
        snapshot: Snapshot,
    },
    /// Remove an observer whose session ended.
    Deregister(Uuid),
}

/// Cloneable producer handle feeding the dispatch loop.
#[derive(Debug, Clone)]
pub struct FanoutQueue {
    tx: UnboundedSender<FanoutMessage>,
}

impl FanoutQueue {
    /// Submit a message to the dispatch loop.
    ///
    /// A send failure means the dispatcher has shut down; the message is
    /// dropped, which only happens during process teardown.
    pub fn submit(&self, message: FanoutMessage) {
        if self.tx.send(message).is_err() {
            debug!("fan-out dispatcher gone, dropping message");
        }
    }

    /// Submit a store event.
    pub fn submit_event(&self, event: StoreEvent) {
        self.submit(FanoutMessage::Event(event));
    }

    /// Remove an observer from the registry.
    pub fn deregister(&self, id: Uuid) {
        self.submit(FanoutMessage::Deregister(id));
    }
}

/// Handle to one observer's outbound frame channel.
///
/// The registry holds one clone; the observer's session task drains the
/// receiving half and writes frames to the transport. The handle never owns
/// the underlying connection: when the session ends, sends simply fail and
/// the dispatcher drops the entry.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    id: Uuid,
    tx: UnboundedSender<ServerFrame>,
}

impl ObserverHandle {
    /// Create a handle plus the receiving half its session will drain.
    pub fn channel() -> (Self, UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id: Uuid::new_v4(), tx }, rx)
    }

    /// This observer's identity in the registry.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a frame for delivery to this observer.
    pub fn send(&self, frame: ServerFrame) -> Result<(), ObserverGone> {
        self.tx.send(frame).map_err(|_| ObserverGone(self.id))
    }
}

/// Delivery failure: the observer's session has ended.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("observer {0} disconnected")]
pub struct ObserverGone(
    /// The registry id of the observer that went away.
    pub Uuid,
);

/// Create a connected queue/dispatcher pair.
pub fn channel() -> (FanoutQueue, FanoutDispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        FanoutQueue { tx },
        FanoutDispatcher {
            rx,
            observers: HashMap::new(),
        },
    )
}

/// Single-consumer dispatch loop owning the observer registry.
#[derive(Debug)]
pub struct FanoutDispatcher {
    rx: UnboundedReceiver<FanoutMessage>,
    observers: HashMap<Uuid, ObserverHandle>,
}

impl FanoutDispatcher {
    /// Run the dispatch loop until every [`FanoutQueue`] clone is dropped.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                FanoutMessage::Event(event) => self.deliver(&event),
                FanoutMessage::Register { observer, snapshot } => {
                    self.register(observer, snapshot);
                }
                FanoutMessage::Resync { observer, snapshot } => {
                    self.resync(&observer, snapshot);
                }
                FanoutMessage::Deregister(id) => {
                    if self.observers.remove(&id).is_some() {
                        debug!(%id, "observer deregistered");
                    }
                }
            }
        }
        debug!("fan-out queue closed, dispatcher exiting");
    }

    /// Deliver one event to every registered observer, dropping any
    /// observer whose channel has closed.
    fn deliver(&mut self, event: &StoreEvent) {
        let frame = EventFrame::from(event);
        let mut gone = Vec::new();
        for (id, observer) in &self.observers {
            if observer.send(ServerFrame::Event(frame.clone())).is_err() {
                gone.push(*id);
            }
        }
        for id in gone {
            self.observers.remove(&id);
            debug!(%id, "observer removed after failed delivery");
        }
    }

    /// Sync the registration snapshot to a new observer, then add it to
    /// the registry. Events already queued behind this registration were
    /// submitted after the snapshot was captured, so the observer receives
    /// each mutation exactly once.
    fn register(&mut self, observer: ObserverHandle, snapshot: Snapshot) {
        let id = observer.id();
        match Self::sync(&observer, snapshot) {
            Ok(()) => {
                self.observers.insert(id, observer);
                info!(%id, observers = self.observers.len(), "observer registered");
            }
            Err(_) => debug!(%id, "observer vanished before initial sync"),
        }
    }

    /// Send fresh sync frames to one observer after an upload replaced the
    /// store. A failed send drops the observer from the registry like any
    /// failed delivery.
    fn resync(&mut self, observer: &ObserverHandle, snapshot: Snapshot) {
        if Self::sync(observer, snapshot).is_err() {
            let id = observer.id();
            if self.observers.remove(&id).is_some() {
                debug!(%id, "observer removed after failed resync");
            }
        }
    }

    /// Send the two state frames, `csvSync` then `kvpSync`.
    fn sync(observer: &ObserverHandle, snapshot: Snapshot) -> Result<(), ObserverGone> {
        observer.send(ServerFrame::Sync(SyncFrame::CsvSync(snapshot.csv)))?;
        observer.send(ServerFrame::Sync(SyncFrame::KvpSync(snapshot.kvp)))
    }
}
