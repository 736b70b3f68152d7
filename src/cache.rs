//! Per-volume line cache for a sliding traversal window

use crate::types::Trace;
use std::collections::BTreeMap;

/// Traces of each resident line, per volume slot
///
/// Slot 0 is the primary volume, slots 1.. the secondary volumes. A cache
/// is owned by the thread that runs the traversal, so it needs no locking.
#[derive(Debug, Default)]
pub struct LineCache {
    slots: Vec<BTreeMap<usize, Vec<Trace>>>,
}

impl LineCache {
    /// Create a cache for `num_volumes` volume slots
    pub fn new(num_volumes: usize) -> Self {
        Self {
            slots: (0..num_volumes).map(|_| BTreeMap::new()).collect(),
        }
    }

    pub fn num_volumes(&self) -> usize {
        self.slots.len()
    }

    /// Store the traces of `line` for volume `slot`, replacing any previous entry
    pub fn put(&mut self, slot: usize, line: usize, traces: Vec<Trace>) {
        if let Some(lines) = self.slots.get_mut(slot) {
            lines.insert(line, traces);
        }
    }

    pub fn get(&self, slot: usize, line: usize) -> Option<&[Trace]> {
        self.slots
            .get(slot)
            .and_then(|lines| lines.get(&line))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, slot: usize, line: usize) -> bool {
        self.get(slot, line).is_some()
    }

    /// Drop one line; returns whether it was resident
    pub fn evict(&mut self, slot: usize, line: usize) -> bool {
        self.slots
            .get_mut(slot)
            .map(|lines| lines.remove(&line).is_some())
            .unwrap_or(false)
    }

    /// Drop every line of one volume
    pub fn clear(&mut self, slot: usize) {
        if let Some(lines) = self.slots.get_mut(slot) {
            lines.clear();
        }
    }

    /// Drop every line of every volume
    pub fn clear_all(&mut self) {
        self.slots.iter_mut().for_each(BTreeMap::clear);
    }

    /// Number of lines resident for a volume
    pub fn resident(&self, slot: usize) -> usize {
        self.slots.get(slot).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, slot: usize) -> bool {
        self.resident(slot) == 0
    }

    /// Resident line indices of a volume, ascending
    pub fn lines(&self, slot: usize) -> Vec<usize> {
        self.slots
            .get(slot)
            .map(|lines| lines.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MissingFill, ZUnit};

    fn traces(n: usize) -> Vec<Trace> {
        (0..n)
            .map(|_| Trace::missing(0.0, 4.0, ZUnit::Milliseconds, 3, MissingFill::Zero))
            .collect()
    }

    #[test]
    fn test_put_get_evict() {
        let mut cache = LineCache::new(2);
        cache.put(0, 3, traces(4));
        cache.put(1, 3, traces(4));

        assert_eq!(cache.get(0, 3).map(<[Trace]>::len), Some(4));
        assert!(cache.get(0, 4).is_none());
        assert!(cache.evict(0, 3));
        assert!(!cache.evict(0, 3));
        assert!(cache.contains(1, 3));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut cache = LineCache::new(2);
        cache.put(0, 0, traces(1));
        cache.put(0, 1, traces(1));
        cache.put(1, 0, traces(1));

        cache.clear(0);
        assert!(cache.is_empty(0));
        assert_eq!(cache.resident(1), 1);

        cache.clear_all();
        assert!(cache.is_empty(1));
    }

    #[test]
    fn test_unknown_slot_is_ignored() {
        let mut cache = LineCache::new(1);
        cache.put(5, 0, traces(1));
        assert!(cache.get(5, 0).is_none());
        assert_eq!(cache.resident(5), 0);
    }

    #[test]
    fn test_lines_sorted() {
        let mut cache = LineCache::new(1);
        for line in [7, 2, 5] {
            cache.put(0, line, traces(1));
        }
        assert_eq!(cache.lines(0), vec![2, 5, 7]);
    }
}
