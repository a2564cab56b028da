//! Request types for the sliding sync endpoint.

use std::{collections::BTreeMap, time::Duration};

use js_int::UInt;
use serde::{Deserialize, Serialize};

/// A sliding sync request.
///
/// This is the body of the long-poll request the client keeps re-opening
/// against the sync proxy. `pos`, `timeout` and `client_timeout` are
/// query-style parameters; transports are free to lift them out of the body
/// and into the request URL.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Request {
    /// A point in time to continue a sync from.
    ///
    /// Should be a token from the `pos` field of a previous response. Absent
    /// on the first request of a connection's lifetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,

    /// Allows clients to know what request params reached the server,
    /// functionally similar to txn IDs on `/send` for events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,

    /// The maximum time for the server to hold the poll open before
    /// responding.
    #[serde(
        with = "crate::serde::duration::opt_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,

    /// The point at which the client gives up on this request.
    ///
    /// Always strictly greater than `timeout`, so that a well-behaved server
    /// times out first and the client never abandons a poll the server is
    /// about to answer.
    #[serde(
        with = "crate::serde::duration::opt_ms",
        default,
        rename = "clientTimeout",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_timeout: Option<Duration>,

    /// The sliding window lists we're interested in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lists: Vec<List>,

    /// Specific rooms and event types that we want to receive events from.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub room_subscriptions: BTreeMap<String, RoomSubscription>,

    /// Specific rooms we no longer want to receive events from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsubscribe_rooms: Vec<String>,

    /// Extensions API: per-extension payloads keyed by extension name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Request {
    /// Creates an empty `Request`.
    pub fn new() -> Self {
        Default::default()
    }
}

/// The per-list request parameters.
///
/// All fields except `ranges` are *sticky*: the server retains them across
/// poll iterations, so they only need to be retransmitted when they change.
/// `ranges` changes on every scroll and is sent with every request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct List {
    /// The ranges of room indices we're interested in, as inclusive
    /// `[lo, hi]` pairs.
    pub ranges: Vec<(UInt, UInt)>,

    /// The sort ordering applied to this list of rooms. Sticky.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,

    /// Filters to apply to the list before sorting. Sticky.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<ListFilters>,

    /// The maximum number of timeline events to return per room. Sticky.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit: Option<UInt>,

    /// Required state for each room returned, as `[event type, state key]`
    /// pairs. Sticky.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_state: Vec<(String, String)>,

    /// Put this list into the all-rooms-mode: the server sends every room
    /// the filters apply to, however slow that may be, and positional
    /// movement operations are no longer emitted for it. Sticky.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_get_all_rooms: Option<bool>,
}

impl List {
    /// Creates a `List` covering the given ranges, with no other parameters.
    pub fn new(ranges: Vec<(UInt, UInt)>) -> Self {
        Self { ranges, ..Default::default() }
    }
}

/// Filters to apply to a sliding window list, set at request time.
///
/// All fields are combined with AND. The absence of a field implies no
/// filter on that criterion, it does NOT imply `false`. Sticky.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ListFilters {
    /// Whether to return DMs, non-DM rooms or both.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dm: Option<bool>,

    /// Whether to return encrypted, non-encrypted rooms or both.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_encrypted: Option<bool>,

    /// Whether to return invited rooms, only joined rooms or both.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_invite: Option<bool>,

    /// Whether to return rooms with tombstones, only rooms without
    /// tombstones or both.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_tombstoned: Option<bool>,

    /// Only list rooms whose name matches this string, case-insensitively
    /// and partially, like SQL `LIKE '%foo%'`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name_like: Option<String>,

    /// Only list rooms whose `m.room.create` type is one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub room_types: Vec<String>,

    /// Only list rooms whose `m.room.create` type is *not* one of these.
    ///
    /// Can be used to filter out spaces from the room list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_room_types: Vec<String>,

    /// Only list rooms that are direct children of one of these spaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spaces: Vec<String>,
}

/// The parameters attached to a room subscription.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RoomSubscription {
    /// Required state for the subscribed room, as `[event type, state key]`
    /// pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_state: Vec<(String, String)>,

    /// The maximum number of timeline events to return for the subscribed
    /// room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_limit: Option<UInt>,
}

impl RoomSubscription {
    /// Creates an empty `RoomSubscription`.
    pub fn new() -> Self {
        Default::default()
    }
}
