//! Per-list client state.

use std::collections::BTreeMap;

use js_int::{UInt, uint};
use sliding_sync_api::request::List;

/// A snapshot of the derived state of one sliding window list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ListData {
    /// The server-reported total number of rooms matching this list.
    pub joined_count: UInt,

    /// The sparse mapping from absolute list index to room id.
    ///
    /// Only indices covered by the list's ranges are tracked.
    pub room_index_to_room_id: BTreeMap<u64, String>,
}

/// One sliding window list: the user-controlled request parameters plus the
/// state derived from server responses.
///
/// All parameters except `ranges` are sticky, so the list tracks a
/// `modified` flag and transmits the full parameter set only when it has
/// changed since the last successful transmission.
#[derive(Debug)]
pub(crate) struct SlidingList {
    params: List,
    modified: bool,
    room_index_to_room_id: BTreeMap<u64, String>,
    joined_count: UInt,
}

impl SlidingList {
    pub(crate) fn new(params: List) -> Self {
        Self {
            params,
            modified: true,
            room_index_to_room_id: BTreeMap::new(),
            joined_count: uint!(0),
        }
    }

    /// Replaces the entire parameter set, invalidating all derived state.
    pub(crate) fn replace(&mut self, params: List) {
        self.params = params;
        self.room_index_to_room_id.clear();
        self.joined_count = uint!(0);
        self.modified = true;
    }

    /// Updates only the window ranges.
    ///
    /// Ranges are not sticky, so this does not touch the modified flag.
    pub(crate) fn update_ranges(&mut self, ranges: Vec<(UInt, UInt)>) {
        self.params.ranges = ranges;
    }

    /// Returns the list fragment to put in the next request: the full
    /// parameter set if it has changed (or `include_sticky` forces it), or
    /// just the ranges otherwise.
    pub(crate) fn snapshot(&self, include_sticky: bool) -> List {
        if self.modified || include_sticky {
            self.params.clone()
        } else {
            List::new(self.params.ranges.clone())
        }
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Whether `index` falls inside any of the tracked window ranges.
    pub(crate) fn index_in_range(&self, index: u64) -> bool {
        self.params
            .ranges
            .iter()
            .any(|&(lo, hi)| u64::from(lo) <= index && index <= u64::from(hi))
    }

    pub(crate) fn params(&self) -> &List {
        &self.params
    }

    pub(crate) fn joined_count(&self) -> UInt {
        self.joined_count
    }

    pub(crate) fn set_joined_count(&mut self, count: UInt) {
        self.joined_count = count;
    }

    pub(crate) fn get(&self, index: u64) -> Option<&String> {
        self.room_index_to_room_id.get(&index)
    }

    pub(crate) fn set(&mut self, index: u64, room_id: String) {
        self.room_index_to_room_id.insert(index, room_id);
    }

    pub(crate) fn remove(&mut self, index: u64) {
        self.room_index_to_room_id.remove(&index);
    }

    /// Removes every mapping whose index lies in `[lo, hi]` inclusive.
    pub(crate) fn remove_range(&mut self, lo: u64, hi: u64) {
        self.room_index_to_room_id.retain(|&index, _| index < lo || hi < index);
    }

    pub(crate) fn room_index_to_room_id(&self) -> &BTreeMap<u64, String> {
        &self.room_index_to_room_id
    }

    pub(crate) fn data(&self) -> ListData {
        ListData {
            joined_count: self.joined_count,
            room_index_to_room_id: self.room_index_to_room_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assign::assign;
    use js_int::uint;
    use sliding_sync_api::request::{List, ListFilters};

    use super::SlidingList;

    fn filtered_list() -> List {
        assign!(List::new(vec![(uint!(0), uint!(9))]), {
            sort: vec!["by_recency".to_owned()],
            filters: Some(assign!(ListFilters::default(), { is_dm: Some(true) })),
        })
    }

    #[test]
    fn new_list_is_modified() {
        let list = SlidingList::new(filtered_list());
        let snapshot = list.snapshot(false);
        assert_eq!(snapshot.sort, vec!["by_recency".to_owned()]);
    }

    #[test]
    fn unmodified_snapshot_is_ranges_only() {
        let mut list = SlidingList::new(filtered_list());
        list.clear_modified();

        let snapshot = list.snapshot(false);
        assert_eq!(snapshot.ranges, vec![(uint!(0), uint!(9))]);
        assert!(snapshot.sort.is_empty());
        assert!(snapshot.filters.is_none());

        let sticky = list.snapshot(true);
        assert_eq!(sticky.sort, vec!["by_recency".to_owned()]);
    }

    #[test]
    fn replace_clears_derived_state_and_marks_modified() {
        let mut list = SlidingList::new(filtered_list());
        list.set(0, "!a:s.org".to_owned());
        list.set_joined_count(uint!(5));
        list.clear_modified();

        list.replace(List::new(vec![(uint!(0), uint!(4))]));

        assert!(list.room_index_to_room_id().is_empty());
        assert_eq!(list.joined_count(), uint!(0));
        // back to transmitting the full parameter set
        assert!(list.snapshot(false).filters.is_none());
        assert_eq!(list.snapshot(false).ranges, vec![(uint!(0), uint!(4))]);
    }

    #[test]
    fn update_ranges_does_not_touch_modified() {
        let mut list = SlidingList::new(filtered_list());
        list.clear_modified();

        list.update_ranges(vec![(uint!(10), uint!(19))]);

        let snapshot = list.snapshot(false);
        assert_eq!(snapshot.ranges, vec![(uint!(10), uint!(19))]);
        assert!(snapshot.sort.is_empty(), "ranges update must not mark the list modified");

        let mut list = SlidingList::new(filtered_list());
        list.update_ranges(vec![(uint!(10), uint!(19))]);
        assert!(
            !list.snapshot(false).sort.is_empty(),
            "ranges update must not clear the modified flag either"
        );
    }

    #[test]
    fn index_in_range_checks_every_range() {
        let mut list = SlidingList::new(List::new(vec![
            (uint!(0), uint!(4)),
            (uint!(10), uint!(14)),
        ]));

        assert!(list.index_in_range(0));
        assert!(list.index_in_range(4));
        assert!(!list.index_in_range(5));
        assert!(list.index_in_range(12));
        assert!(!list.index_in_range(15));

        list.update_ranges(vec![(uint!(2), uint!(3))]);
        assert!(!list.index_in_range(0));
    }

    #[test]
    fn remove_range_is_inclusive() {
        let mut list = SlidingList::new(List::new(vec![(uint!(0), uint!(4))]));
        for i in 0..5 {
            list.set(i, format!("!r{i}:s.org"));
        }

        list.remove_range(1, 3);

        assert_eq!(
            list.room_index_to_room_id().keys().copied().collect::<Vec<_>>(),
            vec![0, 4]
        );
    }
}
