//! Events emitted to engine observers.

use std::{collections::BTreeMap, sync::Arc};

use js_int::UInt;
use sliding_sync_api::{Response, response::Room};
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Where in the request lifecycle a [`LifecycleEvent`] was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// A long-poll came back and its bookkeeping (sync position,
    /// subscription confirmation, sticky flags) has been applied, but room
    /// data has not been emitted yet.
    RequestFinished,

    /// Room data has been emitted and list operations have been replayed.
    Complete,
}

/// Progress of a single long-poll round trip.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct LifecycleEvent {
    /// Which point of the round trip this event marks.
    pub state: LifecycleState,

    /// The response being processed, if the round trip succeeded.
    pub response: Option<Arc<Response>>,

    /// The failure, if it didn't.
    pub error: Option<Arc<TransportError>>,
}

/// The server sent data for one room.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct RoomDataEvent {
    /// The room the data belongs to.
    pub room_id: String,

    /// The data itself.
    pub room: Room,
}

/// A list's index → room-id mapping changed shape.
///
/// Emitted at most once per list per response, after the whole response has
/// been processed.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ListEvent {
    /// The index of the list in the engine's list collection.
    pub index: usize,

    /// The server-reported total number of rooms matching the list.
    pub joined_count: UInt,

    /// A snapshot of the list's index → room-id mapping after replay.
    pub room_index_to_room_id: BTreeMap<u64, String>,
}

/// An event emitted by the engine.
///
/// Within one response, events arrive in the contractual order
/// `Lifecycle(RequestFinished)`, then one `RoomData` per room, then
/// `Lifecycle(Complete)`, then at most one `List` per list.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum SyncEvent {
    /// Progress of the current round trip.
    Lifecycle(LifecycleEvent),

    /// Data for a single room.
    RoomData(RoomDataEvent),

    /// A list's shape changed.
    List(ListEvent),
}

/// The engine's observer list.
///
/// A plain list of unbounded senders: emission never blocks the loop, and
/// per-subscriber channels preserve the contractual event order. Closed
/// subscribers are pruned on the next emission.
#[derive(Debug, Default)]
pub(crate) struct Observers {
    subscribers: Vec<mpsc::UnboundedSender<SyncEvent>>,
}

impl Observers {
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: SyncEvent) {
        self.subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
    }
}
