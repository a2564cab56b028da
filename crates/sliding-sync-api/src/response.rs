//! Response types for the sliding sync endpoint.

use std::collections::BTreeMap;

use js_int::UInt;
use serde::{Deserialize, Serialize};

/// A sliding sync response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Response {
    /// The token to supply in the `pos` param of the next request.
    pub pos: String,

    /// Matches the `txn_id` of the most recent request the server saw that
    /// carried one, acknowledging that request's parameters were applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,

    /// Updates to the sliding window lists, in the order the lists were
    /// requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lists: Vec<ListUpdate>,

    /// The updates on rooms, keyed by room id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rooms: BTreeMap<String, Room>,

    /// Extensions API: per-extension payloads keyed by extension name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Response {
    /// Creates a new `Response` with the given pos.
    pub fn new(pos: String) -> Self {
        Self {
            pos,
            txn_id: None,
            lists: Vec::new(),
            rooms: BTreeMap::new(),
            extensions: BTreeMap::new(),
        }
    }
}

/// The update for a single sliding window list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ListUpdate {
    /// The total number of rooms matching this list's filter.
    pub count: UInt,

    /// The operations to replay, in order, against the local index →
    /// room-id mapping.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ops: Vec<SyncOp>,
}

impl ListUpdate {
    /// Creates a `ListUpdate` with the given count and no operations.
    pub fn new(count: UInt) -> Self {
        Self { count, ops: Vec::new() }
    }
}

/// A positional operation on a sliding window list.
///
/// Tagged by the `op` field on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum SyncOp {
    /// Drop the entry at `index`, leaving a gap a later `INSERT` may shift
    /// into.
    Delete {
        /// The index to remove.
        index: UInt,
    },

    /// Insert `room_id` at `index`, shifting any occupant toward the gap
    /// left by the preceding `DELETE`.
    Insert {
        /// The index to insert at.
        index: UInt,
        /// The room to place there.
        room_id: String,
    },

    /// Mark the entries in `range` as no longer valid.
    Invalidate {
        /// The inclusive `[lo, hi]` range to invalidate.
        range: (UInt, UInt),
    },

    /// Overwrite `range` with `room_ids`, in order.
    Sync {
        /// The inclusive `[lo, hi]` range being overwritten.
        range: (UInt, UInt),
        /// The rooms to assign, starting at `lo`. May be shorter than the
        /// range, signalling the end of the list.
        room_ids: Vec<String>,
    },
}

/// The data the server returns for a single room.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Room {
    /// The name of the room as calculated by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The state events requested via `required_state`, as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_state: Vec<serde_json::Value>,

    /// The timeline of events in the room, as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<serde_json::Value>,

    /// The number of unread notifications for this room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_count: Option<UInt>,

    /// The number of unread highlight notifications for this room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_count: Option<UInt>,

    /// Stripped state events for a not-yet-accepted invite.
    ///
    /// As long as this is present the room must be considered to be in the
    /// invite state, even if there are no state events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_state: Option<Vec<serde_json::Value>>,

    /// Whether this is the first time the server is sending this room down
    /// this connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<bool>,

    /// Whether the timeline was limited and there are more events to
    /// paginate through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limited: Option<bool>,

    /// Whether this room is a direct message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dm: Option<bool>,

    /// A token allowing pagination through the messages before the returned
    /// timeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_batch: Option<String>,
}

impl Room {
    /// Creates an empty `Room`.
    pub fn new() -> Self {
        Default::default()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;
    use js_int::uint;
    use serde_json::{from_value as from_json_value, json, to_value as to_json_value};

    use super::{Response, SyncOp};

    #[test]
    fn ops_deserialize_by_tag() {
        let op: SyncOp = from_json_value(json!({ "op": "DELETE", "index": 3 })).unwrap();
        assert_matches!(op, SyncOp::Delete { index });
        assert_eq!(index, uint!(3));

        let op: SyncOp =
            from_json_value(json!({ "op": "INSERT", "index": 0, "room_id": "!a:s.org" }))
                .unwrap();
        assert_matches!(op, SyncOp::Insert { index, room_id });
        assert_eq!(index, uint!(0));
        assert_eq!(room_id, "!a:s.org");

        let op: SyncOp = from_json_value(json!({ "op": "INVALIDATE", "range": [0, 10] })).unwrap();
        assert_matches!(op, SyncOp::Invalidate { range });
        assert_eq!(range, (uint!(0), uint!(10)));

        let op: SyncOp = from_json_value(json!({
            "op": "SYNC",
            "range": [0, 2],
            "room_ids": ["!a:s.org", "!b:s.org"],
        }))
        .unwrap();
        assert_matches!(op, SyncOp::Sync { range, room_ids });
        assert_eq!(range, (uint!(0), uint!(2)));
        assert_eq!(room_ids.len(), 2);
    }

    #[test]
    fn ops_serialize_with_uppercase_tag() {
        let op = SyncOp::Delete { index: uint!(7) };
        assert_eq!(to_json_value(op).unwrap(), json!({ "op": "DELETE", "index": 7 }));
    }

    #[test]
    fn minimal_response_deserializes() {
        let response: Response = from_json_value(json!({ "pos": "5" })).unwrap();

        assert_eq!(response.pos, "5");
        assert_eq!(response.txn_id, None);
        assert!(response.lists.is_empty());
        assert!(response.rooms.is_empty());
        assert!(response.extensions.is_empty());
    }

    #[test]
    fn room_event_lists_default_to_empty() {
        let response: Response = from_json_value(json!({
            "pos": "6",
            "rooms": { "!a:s.org": { "name": "A" } },
        }))
        .unwrap();

        let room = &response.rooms["!a:s.org"];
        assert_eq!(room.name.as_deref(), Some("A"));
        assert!(room.required_state.is_empty());
        assert!(room.timeline.is_empty());
    }
}
