//! Array-backed binary min-heap over timer deadlines, with O(log n) removal
//! of arbitrary elements.
//!
//! Every entry's current index is cached in a side table keyed by `TimerId`,
//! so an interior timer can be unlinked without a linear scan. The heap never
//! holds the timers themselves, only their ordering keys and ids; the slot
//! arena in [`crate::timer`] owns the rest.

use crate::timer::TimerId;

/// Sentinel for "not currently in the heap" in the position table.
const ABSENT: usize = usize::MAX;

/// Ordering key for a scheduled timer.
///
/// Keys sort by absolute deadline first, then by the sequence id assigned at
/// start time. Sequence ids are unique, so the order is strict: two timers
/// armed for the same instant fire in the order they were started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    /// Absolute expiry time, in the loop's clock domain.
    pub at: u64,
    /// Start-time sequence id, the tie-break.
    pub seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Deadline,
    id: TimerId,
}

/// Min-heap of active timers.
#[derive(Debug, Default)]
pub struct TimerHeap {
    entries: Vec<Entry>,
    /// Current heap index per timer slot, `ABSENT` when not scheduled.
    pos: Vec<usize>,
}

impl TimerHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.pos.get(id.index()).is_some_and(|&p| p != ABSENT)
    }

    /// The next timer to expire, if any.
    pub fn peek(&self) -> Option<(Deadline, TimerId)> {
        self.entries.first().map(|e| (e.key, e.id))
    }

    /// Schedules `id` under `key`. The id must not already be present.
    pub fn insert(&mut self, id: TimerId, key: Deadline) {
        if self.pos.len() <= id.index() {
            self.pos.resize(id.index() + 1, ABSENT);
        }
        debug_assert_eq!(self.pos[id.index()], ABSENT);
        let i = self.entries.len();
        self.entries.push(Entry { key, id });
        self.pos[id.index()] = i;
        self.sift_up(i);
    }

    /// Unlinks `id` from wherever it sits in the heap. Returns false if it
    /// was not present.
    pub fn remove(&mut self, id: TimerId) -> bool {
        let i = match self.pos.get(id.index()) {
            Some(&p) if p != ABSENT => p,
            _ => return false,
        };
        self.pos[id.index()] = ABSENT;
        let last = self.entries.len() - 1;
        if i != last {
            self.entries.swap(i, last);
            self.pos[self.entries[i].id.index()] = i;
        }
        self.entries.pop();
        if i < self.entries.len() {
            // the moved-in entry may violate order in either direction
            self.sift_down(i);
            self.sift_up(i);
        }
        true
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.entries[i].key < self.entries[parent].key {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.entries.len();
        loop {
            let mut smallest = i;
            for child in [2 * i + 1, 2 * i + 2] {
                if child < len && self.entries[child].key < self.entries[smallest].key {
                    smallest = child;
                }
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.pos[self.entries[a].id.index()] = a;
        self.pos[self.entries[b].id.index()] = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(at: u64, seq: u64) -> Deadline {
        Deadline { at, seq }
    }

    #[test]
    fn deadline_order_is_strict() {
        let a = key(10, 0);
        let b = key(10, 1);
        let c = key(9, 7);

        // same deadline: sequence id breaks the tie, exactly one way
        assert!(a < b);
        assert!(!(b < a));
        // earlier deadline wins regardless of seq
        assert!(c < a);
        assert!(c < b);
    }

    #[test]
    fn peek_tracks_minimum_through_inserts() {
        let mut heap = TimerHeap::new();
        assert!(heap.peek().is_none());

        heap.insert(TimerId(0), key(50, 0));
        heap.insert(TimerId(1), key(20, 1));
        heap.insert(TimerId(2), key(80, 2));

        let (min, id) = heap.peek().unwrap();
        assert_eq!(min, key(20, 1));
        assert_eq!(id, TimerId(1));
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn interior_removal_keeps_order() {
        let mut heap = TimerHeap::new();
        for (i, at) in [30u64, 10, 50, 20, 40].iter().enumerate() {
            heap.insert(TimerId(i), key(*at, i as u64));
        }

        // remove an interior node, not the minimum
        assert!(heap.remove(TimerId(3)));
        assert!(!heap.contains(TimerId(3)));
        // removing again is a no-op
        assert!(!heap.remove(TimerId(3)));

        // drain by repeatedly removing the minimum; deadlines must ascend
        let mut seen = Vec::new();
        while let Some((k, id)) = heap.peek() {
            seen.push(k.at);
            assert!(heap.remove(id));
        }
        assert_eq!(seen, vec![10, 30, 40, 50]);
    }

    #[test]
    fn position_index_survives_churn() {
        let mut heap = TimerHeap::new();
        for i in 0..64u64 {
            heap.insert(TimerId(i as usize), key(i * 7 % 23, i));
        }
        // knock out every third timer from the middle of the heap
        for i in (0..64usize).step_by(3) {
            assert!(heap.remove(TimerId(i)));
        }
        for i in 0..64usize {
            assert_eq!(heap.contains(TimerId(i)), i % 3 != 0);
        }

        let mut last = key(0, 0);
        while let Some((k, id)) = heap.peek() {
            assert!(last <= k);
            last = k;
            heap.remove(id);
        }
        assert!(heap.is_empty());
    }
}
