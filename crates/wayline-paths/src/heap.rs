//! The [`SlotHeap`] — a fixed-capacity indexable binary heap.
//!
//! Entries are dense ids (`0..capacity`) ordered by an [`Ord`] key. Next to
//! the heap array the structure keeps a slot table mapping each id to its
//! current heap position, which makes `contains`, `remove` and `update`
//! addressable by id: membership checks are O(1) and re-keying is O(log n).

use thiserror::Error;

/// Sentinel slot value for ids not resident in the heap.
const NO_SLOT: usize = usize::MAX;

/// Insertion was attempted past the heap's fixed capacity.
///
/// The capacity is chosen at construction (one slot per grid cell for
/// searches); overflowing it is a sizing defect, not a runtime condition to
/// recover from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("priority queue capacity {capacity} exceeded")]
pub struct HeapFull {
    pub capacity: usize,
}

#[derive(Copy, Clone, Debug)]
struct Entry<K> {
    id: usize,
    key: K,
}

/// Fixed-capacity binary min-heap over dense ids with an id→slot table.
///
/// An entry A outranks B iff A's key is strictly smaller. Each resident
/// id's heap position is tracked in the slot table; the slot is invalidated
/// the moment the entry leaves the heap, and [`contains`](Self::contains)
/// additionally verifies the recorded slot's occupant, so indices left over
/// from an earlier episode can never alias a live entry.
pub struct SlotHeap<K> {
    entries: Vec<Entry<K>>,
    slots: Vec<usize>,
}

impl<K: Ord + Copy> SlotHeap<K> {
    /// Create a heap able to hold ids `0..capacity`, at most all at once.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            slots: vec![NO_SLOT; capacity],
        }
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the heap holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fixed capacity chosen at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `id` is currently resident.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        self.position(id).is_some()
    }

    /// Insert `id` with the given key.
    ///
    /// Fails deterministically once the fixed capacity is reached. The id
    /// must not already be resident.
    pub fn push(&mut self, id: usize, key: K) -> Result<(), HeapFull> {
        if self.entries.len() == self.slots.len() {
            return Err(HeapFull {
                capacity: self.slots.len(),
            });
        }
        debug_assert!(id < self.slots.len());
        debug_assert!(!self.contains(id));
        let pos = self.entries.len();
        self.entries.push(Entry { id, key });
        self.slots[id] = pos;
        self.sort_up(pos);
        Ok(())
    }

    /// Remove and return the top entry (smallest key), if any.
    pub fn pop(&mut self) -> Option<(usize, K)> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.remove_at(0);
        Some((entry.id, entry.key))
    }

    /// Remove `id`, returning its key, or `None` if it was not resident.
    pub fn remove(&mut self, id: usize) -> Option<K> {
        let pos = self.position(id)?;
        Some(self.remove_at(pos).key)
    }

    /// Re-key a resident entry and restore heap order around it.
    ///
    /// Returns `false` if `id` was not resident.
    pub fn update(&mut self, id: usize, key: K) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.entries[pos].key = key;
        let pos = self.sort_up(pos);
        self.sort_down(pos);
        true
    }

    /// Drop all entries, invalidating their slots.
    pub fn clear(&mut self) {
        for entry in &self.entries {
            self.slots[entry.id] = NO_SLOT;
        }
        self.entries.clear();
    }

    /// The validated heap position of `id`, if resident.
    fn position(&self, id: usize) -> Option<usize> {
        let slot = *self.slots.get(id)?;
        if slot == NO_SLOT {
            return None;
        }
        // The occupant check guards against a stale slot surviving from an
        // episode that no longer owns this heap.
        match self.entries.get(slot) {
            Some(entry) if entry.id == id => Some(slot),
            _ => None,
        }
    }

    /// Remove the entry at `pos` by swapping the last entry into its place,
    /// then re-sorting the relocated entry in whichever direction it needs.
    fn remove_at(&mut self, pos: usize) -> Entry<K> {
        let last = self.entries.len() - 1;
        self.entries.swap(pos, last);
        if pos != last {
            self.slots[self.entries[pos].id] = pos;
        }
        let removed = self.entries[last];
        self.entries.truncate(last);
        self.slots[removed.id] = NO_SLOT;
        if pos < self.entries.len() {
            // The relocated entry came from the bottom but may still belong
            // above its new parent.
            let pos = self.sort_up(pos);
            self.sort_down(pos);
        }
        removed
    }

    /// Swap the entry at `pos` with its parent while it outranks it.
    fn sort_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.entries[pos].key < self.entries[parent].key {
                self.swap_entries(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
        pos
    }

    /// Swap the entry at `pos` with its preferred child while that child
    /// outranks it. On a key tie between the children the right child is
    /// preferred.
    fn sort_down(&mut self, mut pos: usize) -> usize {
        loop {
            let left = pos * 2 + 1;
            if left >= self.entries.len() {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < self.entries.len() && self.entries[right].key <= self.entries[left].key {
                child = right;
            }
            if self.entries[child].key < self.entries[pos].key {
                self.swap_entries(child, pos);
                pos = child;
            } else {
                break;
            }
        }
        pos
    }

    #[inline]
    fn swap_entries(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.slots[self.entries[a].id] = a;
        self.slots[self.entries[b].id] = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, RngExt, SeedableRng};

    fn check_invariants(heap: &SlotHeap<i32>) {
        for pos in 1..heap.entries.len() {
            let parent = (pos - 1) / 2;
            assert!(
                heap.entries[parent].key <= heap.entries[pos].key,
                "heap order violated at position {pos}"
            );
        }
        for (pos, entry) in heap.entries.iter().enumerate() {
            assert_eq!(
                heap.slots[entry.id], pos,
                "slot table out of sync for id {}",
                entry.id
            );
        }
    }

    fn drain(heap: &mut SlotHeap<i32>) -> Vec<i32> {
        let mut keys = Vec::new();
        while let Some((_, key)) = heap.pop() {
            keys.push(key);
            check_invariants(heap);
        }
        keys
    }

    #[test]
    fn pops_in_key_order() {
        let mut heap = SlotHeap::with_capacity(8);
        for (id, key) in [(0, 50), (1, 10), (2, 40), (3, 20), (4, 30)] {
            heap.push(id, key).unwrap();
            check_invariants(&heap);
        }
        assert_eq!(drain(&mut heap), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn contains_tracks_every_mutation() {
        let mut heap = SlotHeap::with_capacity(4);
        assert!(!heap.contains(2));

        heap.push(2, 5).unwrap();
        assert!(heap.contains(2));

        heap.update(2, 1);
        assert!(heap.contains(2));

        assert_eq!(heap.remove(2), Some(1));
        assert!(!heap.contains(2));
        assert_eq!(heap.remove(2), None);

        heap.push(2, 7).unwrap();
        heap.push(0, 3).unwrap();
        assert_eq!(heap.pop(), Some((0, 3)));
        assert!(!heap.contains(0));
        assert!(heap.contains(2));
    }

    #[test]
    fn capacity_overflow_is_deterministic() {
        let mut heap = SlotHeap::with_capacity(2);
        heap.push(0, 1).unwrap();
        heap.push(1, 2).unwrap();
        assert_eq!(heap.len(), heap.capacity());
        // The overfull insertion fails without clobbering resident entries.
        assert_eq!(heap.push(0, 0).unwrap_err(), HeapFull { capacity: 2 });
        assert_eq!(drain(&mut heap), vec![1, 2]);
    }

    #[test]
    fn update_reorders_entry() {
        let mut heap = SlotHeap::with_capacity(8);
        for (id, key) in [(0, 10), (1, 20), (2, 30), (3, 40)] {
            heap.push(id, key).unwrap();
        }
        assert!(heap.update(3, 5));
        check_invariants(&heap);
        assert_eq!(heap.pop(), Some((3, 5)));

        assert!(heap.update(0, 35));
        check_invariants(&heap);
        assert_eq!(drain(&mut heap), vec![20, 30, 35]);

        assert!(!heap.update(7, 1));
    }

    #[test]
    fn remove_relocates_upward_when_needed() {
        // Push order shaped so the arena is [1, 20, 2, 21, 22, 3, 4]:
        // removing id 3 (key 21) relocates the last entry (key 4) under
        // parent key 20, where it must sort *up*, not down.
        let mut heap = SlotHeap::with_capacity(8);
        for (id, key) in [(0, 1), (1, 20), (2, 2), (3, 21), (4, 22), (5, 3), (6, 4)] {
            heap.push(id, key).unwrap();
        }
        assert_eq!(heap.remove(3), Some(21));
        check_invariants(&heap);
        assert_eq!(drain(&mut heap), vec![1, 2, 3, 4, 20, 22]);
    }

    #[test]
    fn clear_invalidates_slots() {
        let mut heap = SlotHeap::with_capacity(4);
        heap.push(1, 10).unwrap();
        heap.push(3, 5).unwrap();
        heap.clear();
        assert!(heap.is_empty());
        assert!(!heap.contains(1));
        assert!(!heap.contains(3));
        heap.push(1, 2).unwrap();
        assert_eq!(heap.pop(), Some((1, 2)));
    }

    #[test]
    fn randomized_ops_match_sorted_model() {
        const CAPACITY: usize = 48;
        for seed in 0..12u64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut heap = SlotHeap::with_capacity(CAPACITY);
            // Reference model: id -> key for resident ids.
            let mut model: Vec<Option<i32>> = vec![None; CAPACITY];

            for _ in 0..2_000 {
                let id = rng.random_range(0..CAPACITY);
                match rng.random_range(0..100) {
                    0..45 => {
                        if model[id].is_none() {
                            let key = rng.random_range(0..500);
                            heap.push(id, key).unwrap();
                            model[id] = Some(key);
                        }
                    }
                    45..65 => {
                        let expected_min = model.iter().filter_map(|k| *k).min();
                        match heap.pop() {
                            Some((popped, key)) => {
                                assert_eq!(Some(key), expected_min);
                                assert_eq!(model[popped], Some(key));
                                model[popped] = None;
                            }
                            None => assert_eq!(expected_min, None),
                        }
                    }
                    65..85 => {
                        assert_eq!(heap.remove(id), model[id].take());
                    }
                    _ => {
                        let key = rng.random_range(0..500);
                        if model[id].is_some() {
                            assert!(heap.update(id, key));
                            model[id] = Some(key);
                        } else {
                            assert!(!heap.update(id, key));
                        }
                    }
                }
                check_invariants(&heap);
                assert_eq!(heap.len(), model.iter().flatten().count());
                assert_eq!(heap.contains(id), model[id].is_some());
            }

            // The surviving entries drain in reference-sorted order.
            let mut expected: Vec<i32> = model.iter().filter_map(|k| *k).collect();
            expected.sort_unstable();
            assert_eq!(drain(&mut heap), expected);
        }
    }
}
