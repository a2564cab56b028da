//! Replay of positional list operations into a list's index map.

use sliding_sync_api::response::{ListUpdate, SyncOp};
use tracing::warn;

use crate::list::SlidingList;

/// Applies one response's operation sequence to a list.
///
/// The server expresses room-list changes as positional operations against
/// the window the client last requested. A room moving up the list arrives
/// as a `DELETE` of its old index followed by an `INSERT` at the new one;
/// the delete leaves a gap that the insert shifts the intervening occupants
/// into. The gap therefore has to be remembered across operations within a
/// single response, but never across responses.
pub(crate) fn replay(list: &mut SlidingList, update: &ListUpdate) {
    list.set_joined_count(update.count);

    let mut gap_index: Option<u64> = None;
    for op in &update.ops {
        match op {
            SyncOp::Delete { index } => {
                let index = u64::from(*index);
                list.remove(index);
                gap_index = Some(index);
            }
            SyncOp::Insert { index, room_id } => {
                let index = u64::from(*index);
                if list.get(index).is_some() {
                    let Some(gap) = gap_index else {
                        warn!(index, %room_id, "INSERT into an occupied index without a preceding DELETE");
                        continue;
                    };
                    shift_toward_gap(list, gap, index);
                }
                list.set(index, room_id.clone());
            }
            SyncOp::Invalidate { range } => {
                list.remove_range(u64::from(range.0), u64::from(range.1));
            }
            SyncOp::Sync { range, room_ids } => {
                // The server may send fewer room ids than the range covers;
                // running out of ids is the end-of-list signal.
                for (index, room_id) in (u64::from(range.0)..=u64::from(range.1)).zip(room_ids) {
                    list.set(index, room_id.clone());
                }
            }
            _ => {}
        }
    }
}

/// Moves the occupants between `gap` and `index` one step toward the gap,
/// freeing up `index` for an insertion.
///
/// Indices outside the tracked ranges are skipped: their contents are not
/// owned by the client, so there is nothing meaningful to move through them.
fn shift_toward_gap(list: &mut SlidingList, gap: u64, index: u64) {
    if gap > index {
        let mut i = gap;
        while i > index {
            if list.index_in_range(i) {
                shift_one(list, i, i - 1);
            }
            i -= 1;
        }
    } else {
        let mut i = gap;
        while i < index {
            if list.index_in_range(i) {
                shift_one(list, i, i + 1);
            }
            i += 1;
        }
    }
}

fn shift_one(list: &mut SlidingList, dst: u64, src: u64) {
    match list.get(src).cloned() {
        Some(room_id) => list.set(dst, room_id),
        None => list.remove(dst),
    }
}
