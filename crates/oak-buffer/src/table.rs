//! Lock-free extent table mapping resident extent ids to frame ids.

use crate::frame::FrameId;
use oak_common::ExtentId;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Direct array size. Extent ids are handed out densely from 1, so the
/// first ids cover the overwhelmingly common case.
const DIRECT_SLOTS: usize = 16384;

/// Sentinel value for empty slots in the direct path.
const EMPTY_FRAME: u32 = u32::MAX;

/// Sentinel value for empty key slots in the hash tier.
const EMPTY_KEY: u64 = u64::MAX;

/// Sentinel value for deleted key slots (tombstone).
const TOMBSTONE_KEY: u64 = u64::MAX - 1;

/// Lock-free map from extent id to the frame holding it.
///
/// Two-tier lookup:
/// - Direct array indexed by extent id for ids below `DIRECT_SLOTS`
/// - Open-addressing hash table with linear probing for larger ids
pub struct ExtentTable {
    /// Direct array for low extent ids. Stores the frame id directly.
    direct: Box<[AtomicU32]>,
    /// Hash tier keys (raw extent ids).
    hash_keys: Box<[AtomicU64]>,
    /// Hash tier values (frame ids).
    hash_values: Box<[AtomicU32]>,
    /// Bitmask for hash indexing (hash_size - 1).
    hash_mask: usize,
}

impl ExtentTable {
    /// Creates a table with capacity for the given number of frames.
    pub fn new(capacity: usize) -> Self {
        // Hash tier size = next power of 2, 2x capacity for ~50% load factor.
        let hash_size = (capacity * 2).next_power_of_two().max(1024);

        let direct: Box<[AtomicU32]> = (0..DIRECT_SLOTS)
            .map(|_| AtomicU32::new(EMPTY_FRAME))
            .collect();
        let hash_keys: Box<[AtomicU64]> =
            (0..hash_size).map(|_| AtomicU64::new(EMPTY_KEY)).collect();
        let hash_values: Box<[AtomicU32]> = (0..hash_size)
            .map(|_| AtomicU32::new(EMPTY_FRAME))
            .collect();

        Self {
            direct,
            hash_keys,
            hash_values,
            hash_mask: hash_size - 1,
        }
    }

    /// Looks up an extent and returns its frame if resident.
    #[inline]
    pub fn get(&self, extent_id: ExtentId) -> Option<FrameId> {
        if (extent_id.0 as usize) < DIRECT_SLOTS {
            let val = self.direct[extent_id.0 as usize].load(Ordering::Acquire);
            if val != EMPTY_FRAME {
                return Some(FrameId(val));
            }
            return None;
        }
        self.get_from_hash(extent_id.0)
    }

    fn get_from_hash(&self, key: u64) -> Option<FrameId> {
        let mut idx = self.hash_index(key);

        for _ in 0..self.hash_keys.len() {
            let stored = self.hash_keys[idx].load(Ordering::Acquire);
            if stored == EMPTY_KEY {
                return None;
            }
            if stored == key {
                return Some(FrameId(self.hash_values[idx].load(Ordering::Acquire)));
            }
            // Skip tombstones and continue probing.
            idx = (idx + 1) & self.hash_mask;
        }
        None
    }

    /// Inserts or updates an extent-to-frame mapping. Returns true on success.
    pub fn insert(&self, extent_id: ExtentId, frame_id: FrameId) -> bool {
        if (extent_id.0 as usize) < DIRECT_SLOTS {
            self.direct[extent_id.0 as usize].store(frame_id.0, Ordering::Release);
            return true;
        }
        self.insert_to_hash(extent_id.0, frame_id)
    }

    fn insert_to_hash(&self, key: u64, frame_id: FrameId) -> bool {
        let mut idx = self.hash_index(key);

        for _ in 0..self.hash_keys.len() {
            let stored = self.hash_keys[idx].load(Ordering::Acquire);
            if stored == EMPTY_KEY || stored == TOMBSTONE_KEY {
                self.hash_values[idx].store(frame_id.0, Ordering::Release);
                self.hash_keys[idx].store(key, Ordering::Release);
                return true;
            }
            if stored == key {
                self.hash_values[idx].store(frame_id.0, Ordering::Release);
                return true;
            }
            idx = (idx + 1) & self.hash_mask;
        }
        false // table full
    }

    /// Removes a mapping. Returns the frame id if it was present.
    pub fn remove(&self, extent_id: ExtentId) -> Option<FrameId> {
        if (extent_id.0 as usize) < DIRECT_SLOTS {
            let old = self.direct[extent_id.0 as usize].swap(EMPTY_FRAME, Ordering::AcqRel);
            if old != EMPTY_FRAME {
                return Some(FrameId(old));
            }
            return None;
        }
        self.remove_from_hash(extent_id.0)
    }

    fn remove_from_hash(&self, key: u64) -> Option<FrameId> {
        let mut idx = self.hash_index(key);

        for _ in 0..self.hash_keys.len() {
            let stored = self.hash_keys[idx].load(Ordering::Acquire);
            if stored == EMPTY_KEY {
                return None;
            }
            if stored == key {
                let frame_id = self.hash_values[idx].load(Ordering::Acquire);
                self.hash_keys[idx].store(TOMBSTONE_KEY, Ordering::Release);
                return Some(FrameId(frame_id));
            }
            idx = (idx + 1) & self.hash_mask;
        }
        None
    }

    #[inline]
    fn hash_index(&self, key: u64) -> usize {
        // FxHash-style multiply for distribution.
        let hash = key.wrapping_mul(0x517cc1b727220a95);
        (hash as usize) & self.hash_mask
    }

    /// Returns true if the extent is resident.
    pub fn contains(&self, extent_id: ExtentId) -> bool {
        self.get(extent_id).is_some()
    }

    /// Returns the number of resident extents.
    pub fn len(&self) -> usize {
        let direct_count = self
            .direct
            .iter()
            .filter(|slot| slot.load(Ordering::Relaxed) != EMPTY_FRAME)
            .count();
        let hash_count = self
            .hash_keys
            .iter()
            .filter(|slot| {
                let key = slot.load(Ordering::Relaxed);
                key != EMPTY_KEY && key != TOMBSTONE_KEY
            })
            .count();
        direct_count + hash_count
    }

    /// Returns true if no extents are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all entries, calling `f` for each. Stops early when
    /// `f` returns false.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(ExtentId, FrameId) -> bool,
    {
        for (eid, slot) in self.direct.iter().enumerate() {
            let val = slot.load(Ordering::Relaxed);
            if val != EMPTY_FRAME && !f(ExtentId(eid as u64), FrameId(val)) {
                return;
            }
        }
        for (idx, key_slot) in self.hash_keys.iter().enumerate() {
            let key = key_slot.load(Ordering::Relaxed);
            if key != EMPTY_KEY && key != TOMBSTONE_KEY {
                let frame_id = self.hash_values[idx].load(Ordering::Relaxed);
                if !f(ExtentId(key), FrameId(frame_id)) {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_path_insert_get() {
        let table = ExtentTable::new(100);

        assert!(table.insert(ExtentId(42), FrameId(7)));
        assert_eq!(table.get(ExtentId(42)), Some(FrameId(7)));
        assert!(table.contains(ExtentId(42)));
        assert_eq!(table.get(ExtentId(43)), None);
    }

    #[test]
    fn test_direct_path_remove() {
        let table = ExtentTable::new(100);

        table.insert(ExtentId(42), FrameId(7));
        assert_eq!(table.remove(ExtentId(42)), Some(FrameId(7)));
        assert_eq!(table.get(ExtentId(42)), None);
        assert_eq!(table.remove(ExtentId(42)), None);
    }

    #[test]
    fn test_hash_path_insert_get_remove() {
        let table = ExtentTable::new(100);
        let big = ExtentId(DIRECT_SLOTS as u64 + 100);

        assert!(table.insert(big, FrameId(5)));
        assert_eq!(table.get(big), Some(FrameId(5)));

        assert_eq!(table.remove(big), Some(FrameId(5)));
        assert_eq!(table.get(big), None);
    }

    #[test]
    fn test_hash_path_tombstone_reuse() {
        let table = ExtentTable::new(4);
        let base = DIRECT_SLOTS as u64;

        for i in 0..100 {
            let eid = ExtentId(base + i);
            assert!(table.insert(eid, FrameId(i as u32)));
            assert_eq!(table.remove(eid), Some(FrameId(i as u32)));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_update_existing() {
        let table = ExtentTable::new(100);

        table.insert(ExtentId(1), FrameId(1));
        table.insert(ExtentId(1), FrameId(2));
        assert_eq!(table.get(ExtentId(1)), Some(FrameId(2)));
        assert_eq!(table.len(), 1);

        let big = ExtentId(DIRECT_SLOTS as u64 + 5);
        table.insert(big, FrameId(3));
        table.insert(big, FrameId(4));
        assert_eq!(table.get(big), Some(FrameId(4)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_len_and_for_each() {
        let table = ExtentTable::new(100);
        assert!(table.is_empty());

        table.insert(ExtentId(1), FrameId(1));
        table.insert(ExtentId(2), FrameId(2));
        table.insert(ExtentId(DIRECT_SLOTS as u64 + 1), FrameId(3));
        assert_eq!(table.len(), 3);

        let mut seen = Vec::new();
        table.for_each(|eid, fid| {
            seen.push((eid, fid));
            true
        });
        assert_eq!(seen.len(), 3);
    }
}
