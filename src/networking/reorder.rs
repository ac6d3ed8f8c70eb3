use std::collections::BTreeMap;

use log::trace;

/// Collects the parts (one per adaptation set) of numbered segment slots and releases complete slots strictly
/// in slot order, no matter in which order the parts arrive.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    parts: usize,
    pending: BTreeMap<u64, Vec<Option<T>>>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(start: u64, parts: usize) -> Self {
        Self {
            next: start,
            parts: parts.max(1),
            pending: BTreeMap::new(),
        }
    }

    pub fn next(&self) -> u64 {
        self.next
    }

    pub fn pending_slots(&self) -> usize {
        self.pending.len()
    }

    /// Returns false for slots that were already released or parts that already arrived.
    pub fn insert(&mut self, slot: u64, part: usize, value: T) -> bool {
        if slot < self.next || part >= self.parts {
            trace!("Ignoring late part {} of slot {}", part, slot);
            return false;
        }

        let parts = self.parts;
        let entry = self
            .pending
            .entry(slot)
            .or_insert_with(|| (0..parts).map(|_| None).collect());
        if entry[part].is_some() {
            return false;
        }

        entry[part] = Some(value);
        true
    }

    /// Releases the next slot once all of its parts arrived.
    pub fn pop_ready(&mut self) -> Option<(u64, Vec<T>)> {
        let complete = self
            .pending
            .get(&self.next)
            .is_some_and(|parts| parts.iter().all(Option::is_some));
        if !complete {
            return None;
        }

        let slot = self.next;
        let parts = self.pending.remove(&slot)?;
        self.next += 1;
        Some((slot, parts.into_iter().flatten().collect()))
    }

    /// Drops everything pending and continues at `start`.
    pub fn reset(&mut self, start: u64) {
        self.pending.clear();
        self.next = start;
    }
}

#[cfg(test)]
mod tests {
    use super::ReorderBuffer;

    #[test]
    pub fn releases_in_slot_order() {
        let mut buffer = ReorderBuffer::new(3, 2);
        assert!(buffer.insert(4, 0, "4a"));
        assert!(buffer.insert(4, 1, "4b"));
        assert!(buffer.insert(3, 1, "3b"));
        assert_eq!(buffer.pop_ready(), None);

        assert!(buffer.insert(3, 0, "3a"));
        assert_eq!(buffer.pop_ready(), Some((3, vec!["3a", "3b"])));
        assert_eq!(buffer.pop_ready(), Some((4, vec!["4a", "4b"])));
        assert_eq!(buffer.pop_ready(), None);
    }

    #[test]
    pub fn ignores_late_and_duplicate_parts() {
        let mut buffer = ReorderBuffer::new(0, 1);
        assert!(buffer.insert(0, 0, 1));
        assert!(!buffer.insert(0, 0, 2));
        assert_eq!(buffer.pop_ready(), Some((0, vec![1])));
        assert!(!buffer.insert(0, 0, 3));

        buffer.insert(5, 0, 5);
        buffer.reset(10);
        assert_eq!(buffer.pending_slots(), 0);
        assert_eq!(buffer.next(), 10);
    }
}
