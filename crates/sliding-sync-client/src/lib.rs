//! A client-side protocol driver for sliding sync.
//!
//! The entry point is [`SlidingSync`]: a long-running engine that keeps one
//! long-poll open against a sync proxy, reconciles the server's positional
//! list operations into local index → room-id mappings, and emits a
//! strictly ordered stream of [`SyncEvent`]s for a higher-level SDK to
//! consume.
//!
//! The engine does no HTTP itself; callers supply a [`Transport`] that
//! issues the actual requests and mints transaction identifiers.
//!
//! # Usage
//!
//! ```ignore
//! // `HttpTransport` stands in for your `Transport` implementation.
//! use sliding_sync_api::request::List;
//! use sliding_sync_client::{SlidingSync, SyncEvent};
//!
//! let engine = SlidingSync::builder()
//!     .poll_timeout(std::time::Duration::from_secs(30))
//!     .list(List::new(vec![(uint!(0), uint!(20))]))
//!     .build(HttpTransport::new("https://proxy.example.com"));
//!
//! let mut events = engine.subscribe();
//! let looper = engine.clone();
//! tokio::spawn(async move { looper.start().await });
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SyncEvent::RoomData(update) => { /* ingest the room */ }
//!         SyncEvent::List(update) => { /* re-render the room list */ }
//!         SyncEvent::Lifecycle(_) => {}
//!     }
//! }
//! ```
//!
//! Mutations — scrolling a window with
//! [`set_list_ranges`][SlidingSync::set_list_ranges], reshaping a list with
//! [`set_list`][SlidingSync::set_list], subscribing to rooms with
//! [`modify_room_subscriptions`][SlidingSync::modify_room_subscriptions] —
//! interrupt the in-flight poll, so the next request reflects them without
//! waiting for the server's timeout. Each returns a [`TxnHandle`] that
//! resolves once the server acknowledges the change.

#![warn(missing_docs)]

mod engine;
mod error;
mod events;
mod extensions;
mod list;
mod ops;
mod subscriptions;
mod transport;
mod txn;

pub use sliding_sync_api as api;

pub use self::{
    engine::{SlidingSync, SlidingSyncBuilder},
    error::{Error, TransportError, TxnError},
    events::{LifecycleEvent, LifecycleState, ListEvent, RoomDataEvent, SyncEvent},
    extensions::{Extension, ExtensionPhase},
    list::ListData,
    transport::Transport,
    txn::TxnHandle,
};
